use indicatif::ProgressStyle;

const ONLY_MESSAGE_TEMPLATE: &str = "{spinner} {wide_msg}";
const NUMBER_TEMPLATE: &str = "{spinner} {msg:24} {wide_bar:} {pos:>5}/{len}";
const BACKOFF_TEMPLATE: &str = "{spinner:.yellow} {wide_msg:.yellow}";

pub struct ProgressStyleTemplate;

impl ProgressStyleTemplate {
    pub fn only_message() -> ProgressStyle {
        ProgressStyle::with_template(ONLY_MESSAGE_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    pub fn number_bar() -> ProgressStyle {
        ProgressStyle::with_template(NUMBER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }

    /// Spinner shown while the client sleeps off a rate limit.
    pub fn backoff() -> ProgressStyle {
        ProgressStyle::with_template(BACKOFF_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_parse() {
        for template in [ONLY_MESSAGE_TEMPLATE, NUMBER_TEMPLATE, BACKOFF_TEMPLATE] {
            assert!(ProgressStyle::with_template(template).is_ok(), "{template}");
        }
    }
}
