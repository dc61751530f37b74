/// Sanitizes authored markup (rich text and accordion bodies) before it is stored.
///
/// Whitelist-based: formatting tags such as <b> and <p> survive, while <script>
/// and <iframe> and event-handler attributes like onclick are stripped. The
/// content renderer emits stored markup verbatim, so this is the only place
/// markup is cleaned.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
