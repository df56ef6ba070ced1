// ABOUTME: Comment stripping for JSON-with-comments devcontainer files
// ABOUTME: Removes // and /* */ comments while preserving string literal contents

/// Strip `//` line comments and `/* */` block comments from JSONC input.
///
/// String literals are respected: a `//` inside a quoted value survives.
/// Comment bytes are replaced with spaces (newlines kept) so serde error
/// positions still point at the original document.
pub fn strip_comments(input: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        InString { escaped: bool },
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(input.len());
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '"' => {
                    state = State::InString { escaped: false };
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::InString { escaped } => {
                out.push(c);
                state = match (escaped, c) {
                    (true, _) => State::InString { escaped: false },
                    (false, '\\') => State::InString { escaped: true },
                    (false, '"') => State::Normal,
                    _ => State::InString { escaped: false },
                };
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                    out.push_str("  ");
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
    }

    out
}
