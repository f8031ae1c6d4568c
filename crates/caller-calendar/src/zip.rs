//! ZIP code extraction from free text.

use caller_types::ZipCode;

/// Returns the last standalone five-digit group in an address.
///
/// The last group wins so a five-digit street number does not shadow the
/// real ZIP. A ZIP+4 suffix is ignored; runs longer than five digits
/// (phone numbers, order ids) never match.
pub fn extract_zip(location: &str) -> Option<ZipCode> {
    digit_runs(location)
        .into_iter()
        .rev()
        .find(|run| run.len() == 5)
        .and_then(|run| ZipCode::parse(&run).ok())
}

fn digit_runs(text: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn spoken_digit(word: &str) -> Option<char> {
    let digit = match word {
        "zero" | "oh" | "o" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        _ => return None,
    };
    Some(digit)
}

/// Finds a ZIP code in a speech transcript.
///
/// Speech recognizers return ZIPs as "77002", "7 7 0 0 2", "77-002" or
/// "seven seven oh oh two". Consecutive numeric tokens and digit words are
/// joined into one run; any other word ends the run. The first run of
/// exactly five digits is the answer.
pub fn zip_from_speech(utterance: &str) -> Option<ZipCode> {
    let lowered = utterance.to_lowercase();
    let mut run = String::new();

    for token in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            run.push_str(token);
            continue;
        }
        if let Some(d) = spoken_digit(token) {
            run.push(d);
            continue;
        }
        if run.len() == 5 {
            return ZipCode::parse(&run).ok();
        }
        run.clear();
    }

    if run.len() == 5 {
        return ZipCode::parse(&run).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip(s: &str) -> Option<String> {
        extract_zip(s).map(|z| z.as_str().to_string())
    }

    fn heard(s: &str) -> Option<String> {
        zip_from_speech(s).map(|z| z.as_str().to_string())
    }

    #[test]
    fn extracts_zip_from_address() {
        assert_eq!(zip("1 Main St, Houston, TX 77002").as_deref(), Some("77002"));
        assert_eq!(zip("12345 Katy Fwy, Houston, TX 77079").as_deref(), Some("77079"));
        assert_eq!(zip("500 Elm, Dallas TX 75201-1234").as_deref(), Some("75201"));
    }

    #[test]
    fn ignores_longer_runs_and_missing_zip() {
        assert_eq!(zip("call 7135551234"), None);
        assert_eq!(zip("Zoom meeting"), None);
        assert_eq!(zip("Suite 12, Austin"), None);
    }

    #[test]
    fn speech_numerals() {
        assert_eq!(heard("My zip is 77002.").as_deref(), Some("77002"));
        assert_eq!(heard("it's 7 7 0 0 2").as_deref(), Some("77002"));
        assert_eq!(heard("770-02 I think").as_deref(), Some("77002"));
    }

    #[test]
    fn speech_words() {
        assert_eq!(heard("seven seven oh oh two").as_deref(), Some("77002"));
        assert_eq!(heard("Seven Five Two Zero One please").as_deref(), Some("75201"));
        assert_eq!(heard("7 seven 0 zero 2").as_deref(), Some("77002"));
    }

    #[test]
    fn speech_rejects_wrong_lengths() {
        assert_eq!(heard("my number is 713 555 1234"), None);
        assert_eq!(heard("seven seven oh two"), None);
        assert_eq!(heard("I need an appointment"), None);
    }

    #[test]
    fn speech_takes_first_valid_run() {
        assert_eq!(
            heard("call 713 555 1234 my zip is 77002 or 75201").as_deref(),
            Some("77002")
        );
    }
}
