//! Call stack rendering
//!
//! Turns the frame records captured with a request into a readable trace.

use crate::capture::FrameRecord;

/// Rendered in place of an empty or missing stack, so consumers can tell
/// "no trace captured" apart from a blank string.
pub const NO_STACK_SENTINEL: &str = "No stack trace available";

/// Render a captured call stack as one line per frame, innermost frame first.
///
/// Each line has the form `<function> @ <source_url>:<line>:<column>`, with
/// `<anonymous>` standing in for unnamed functions and the position suffix
/// dropped when the browser did not report one. Pure and deterministic.
pub fn format_call_stack(stack: &[FrameRecord]) -> String {
    if stack.is_empty() {
        return NO_STACK_SENTINEL.to_string();
    }

    stack
        .iter()
        .map(format_frame)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_frame(frame: &FrameRecord) -> String {
    let name = frame.function_name.as_deref().unwrap_or("<anonymous>");
    match (frame.line, frame.column) {
        (Some(line), Some(column)) => {
            format!("{} @ {}:{}:{}", name, frame.source_url, line, column)
        }
        (Some(line), None) => format!("{} @ {}:{}", name, frame.source_url, line),
        _ => format!("{} @ {}", name, frame.source_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(
        function_name: Option<&str>,
        source_url: &str,
        line: Option<i64>,
        column: Option<i64>,
    ) -> FrameRecord {
        FrameRecord {
            function_name: function_name.map(String::from),
            source_url: source_url.to_string(),
            line,
            column,
        }
    }

    #[test]
    fn empty_stack_renders_sentinel() {
        assert_eq!(format_call_stack(&[]), NO_STACK_SENTINEL);
    }

    #[test]
    fn full_frame_renders_name_url_line_column() {
        let stack = vec![frame(Some("f"), "https://x/a.js", Some(3), Some(5))];
        assert_eq!(format_call_stack(&stack), "f @ https://x/a.js:3:5");
    }

    #[test]
    fn anonymous_frame_gets_placeholder_name() {
        let stack = vec![frame(None, "https://x/a.js", Some(10), Some(0))];
        assert_eq!(format_call_stack(&stack), "<anonymous> @ https://x/a.js:10:0");
    }

    #[test]
    fn missing_position_is_omitted() {
        let stack = vec![
            frame(Some("boot"), "https://x/a.js", None, None),
            frame(Some("init"), "https://x/b.js", Some(7), None),
        ];
        assert_eq!(
            format_call_stack(&stack),
            "boot @ https://x/a.js\ninit @ https://x/b.js:7"
        );
    }

    #[test]
    fn frames_render_innermost_first() {
        let stack = vec![
            frame(Some("inner"), "https://x/a.js", Some(1), Some(1)),
            frame(Some("outer"), "https://x/a.js", Some(9), Some(1)),
        ];
        let rendered = format_call_stack(&stack);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("inner"));
        assert!(lines[1].starts_with("outer"));
    }

    #[test]
    fn formatting_is_repeatable() {
        let stack = vec![frame(Some("f"), "https://x/a.js", Some(3), Some(5))];
        assert_eq!(format_call_stack(&stack), format_call_stack(&stack));
    }
}
