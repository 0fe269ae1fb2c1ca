use anyhow::Result;

use anyhow::anyhow;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use directories::ProjectDirs;

pub fn pluralize(word: &str, count: usize) -> String {
    pluralize_with(word, count, |n| n.to_string())
}

pub fn pluralize_with<F>(word: &str, count: usize, format_count: F) -> String
where
    F: Fn(usize) -> String,
{
    let count_str = format_count(count);

    if count == 1 {
        format!("{count_str} {word}")
    } else {
        format!("{count_str} {word}s")
    }
}

/// Deck text goes straight to the terminal, so escape sequences in it are dropped.
pub fn strip_controls_and_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // ANSI escape sequence (ESC … letter)
            '\x1b' => {
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }

            c if c.is_control() => {}

            c => out.push(c),
        }
    }

    out.trim().to_string()
}

pub fn ask_yn(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .report(true)
        .wait_for_newline(true)
        .interact()?)
}

pub fn get_data_dir() -> Result<std::path::PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "studyflow")
        .ok_or_else(|| anyhow!("Could not determine project directory"))?;

    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_controls_and_escapes() {
        let input = "\x1b[1mHallo\x1b[0m\n";
        assert_eq!(strip_controls_and_escapes(input), "Hallo");
    }

    #[test]
    fn test_pluralize_single() {
        assert_eq!(pluralize("item", 1), "1 item");
        assert_eq!(pluralize("question", 1), "1 question");
    }

    #[test]
    fn test_pluralize_multiple() {
        assert_eq!(pluralize("item", 2), "2 items");
        assert_eq!(pluralize("point", 5), "5 points");
    }

    #[test]
    fn test_pluralize_zero() {
        assert_eq!(pluralize("day", 0), "0 days");
    }

    #[test]
    fn test_pluralize_with_custom_count() {
        assert_eq!(pluralize_with("point", 3, |n| format!("+{n}")), "+3 points");
    }
}
