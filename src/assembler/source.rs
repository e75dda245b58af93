//! Comment stripping. Comments are blanked out rather than removed so that line numbers, and
//! columns, still refer to the source text.

/// Replaces `// ...` and `/* ... */` comments with spaces, keeping every newline. An unterminated
/// block comment yields the line it opened on.
pub fn strip_comments(text: &str) -> Result<String, usize> {
  let mut stripped = String::with_capacity(text.len());
  let mut chars = text.chars().peekable();
  let mut line = 1;

  while let Some(c) = chars.next() {
    match (c, chars.peek()) {

      ('/', Some('/')) => {
        stripped.push(' ');
        while let Some(next) = chars.peek() {
          if *next == '\n' {
            break;
          }
          stripped.push(' ');
          chars.next();
        }
      }

      ('/', Some('*')) => {
        let opened_on = line;
        chars.next();
        stripped.push_str("  ");
        let mut closed = false;
        while let Some(next) = chars.next() {
          match next {
            '*' if chars.peek() == Some(&'/') => {
              chars.next();
              stripped.push_str("  ");
              closed = true;
              break;
            }
            '\n' => {
              line += 1;
              stripped.push('\n');
            }
            _ => stripped.push(' ')
          }
        }
        if !closed {
          return Err(opened_on);
        }
      }

      ('\n', _) => {
        line += 1;
        stripped.push('\n');
      }

      (c, _) => stripped.push(c)

    }
  }
  Ok(stripped)
}
