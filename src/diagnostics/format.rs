/// Format error message by replacing {} placeholders with values
///
/// # Example
/// ```
/// use weft::diagnostics::format_message;
/// let msg = format_message("Reaction `{}` of `{}`.", &["recv", "sink"]);
/// assert_eq!(msg, "Reaction `recv` of `sink`.");
/// ```
pub fn format_message(template: &str, values: &[&str]) -> String {
    let mut result = template.to_string();
    for value in values {
        result = result.replacen("{}", value, 1);
    }
    result
}
