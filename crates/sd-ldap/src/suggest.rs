//! Username and mail address derivation.
//!
//! Names are folded to ASCII before anything is derived from them:
//! German umlauts become digraphs, other diacritics are dropped after
//! canonical decomposition.
//!
//! Username candidates combine a three-letter "begin" and "end" fragment of
//! each name. For "Viktor Gruber" the fragments are `vik`/`tor` and
//! `gru`/`ber`, giving `vikgru, gruvik, vikber, bervik, torgru, grutor,
//! torber, bertor`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use sd_core::{AccountError, AccountResult};

/// Minimum given name length for username suggestions.
pub const MIN_GIVEN_NAME_LEN: usize = 3;
/// Minimum family name length for username suggestions.
pub const MIN_SURNAME_LEN: usize = 4;
/// Number of candidates produced for long enough names.
pub const CANDIDATE_COUNT: usize = 8;

const FRAGMENT_LEN: usize = 3;

const DIGRAPHS: [(char, &str); 7] = [
    ('ä', "ae"),
    ('Ä', "Ae"),
    ('ü', "ue"),
    ('Ü', "Ue"),
    ('ö', "oe"),
    ('Ö', "Oe"),
    ('ß', "ss"),
];

/// Folds a name to ASCII letters where possible.
///
/// ```ignore
/// assert_eq!(asciify("Müller-Schön"), "Mueller-Schoen");
/// ```
#[must_use]
pub fn asciify(value: &str) -> String {
    let mut replaced = String::with_capacity(value.len());
    for c in value.trim().chars() {
        match DIGRAPHS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => replaced.push_str(to),
            None => replaced.push(c),
        }
    }
    replaced.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalizes a name for use in a mail local part or username: dots
/// removed, ASCII-folded, lowercased, and every run of other characters
/// collapsed to one hyphen.
#[must_use]
pub fn mailify(value: &str) -> String {
    let folded = asciify(&value.trim().replace('.', "")).to_lowercase();
    let mut result = String::with_capacity(folded.len());
    let mut in_run = false;
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
            in_run = false;
        } else if !in_run {
            result.push('-');
            in_run = true;
        }
    }
    result
}

/// Builds `<given>.<sn>@<domain>` from normalized names.
#[must_use]
pub fn create_mail(given_name: &str, sn: &str, domain: &str) -> String {
    format!("{}.{}@{domain}", mailify(given_name), mailify(sn))
}

/// Returns whether an explicitly chosen uid is acceptable: 6 to 8 ASCII
/// letters.
#[must_use]
pub fn is_valid_uid(uid: &str) -> bool {
    (6..=8).contains(&uid.len()) && uid.chars().all(|c| c.is_ascii_alphabetic())
}

/// Clamped substring by character positions.
fn slice(value: &[char], start: usize, end: usize) -> String {
    let end = end.min(value.len());
    let start = start.min(end);
    value[start..end].iter().collect()
}

/// Returns the ordered, duplicate-free username candidates for a name.
///
/// # Errors
///
/// Returns a validation error when either name is blank or shorter than
/// the minimum length after normalization.
pub fn suggestions(given_name: &str, sn: &str) -> AccountResult<Vec<String>> {
    if given_name.trim().is_empty() {
        return Err(AccountError::validation("user.firstname.required"));
    }
    if sn.trim().is_empty() {
        return Err(AccountError::validation("user.surname.required"));
    }

    let given: Vec<char> = mailify(given_name).chars().collect();
    let family: Vec<char> = mailify(sn).chars().collect();
    if given.len() < MIN_GIVEN_NAME_LEN || family.len() < MIN_SURNAME_LEN {
        return Err(AccountError::validation("user.create.usernames.dontmatch"));
    }

    let joined: Vec<char> = given.iter().chain(family.iter()).copied().collect();

    let begin: Vec<char> = slice(&joined, 0, FRAGMENT_LEN)
        .chars()
        .chain(family.iter().copied())
        .take(2 * FRAGMENT_LEN)
        .collect();
    let given_begin = slice(&begin, 0, FRAGMENT_LEN);
    let family_begin = slice(&begin, FRAGMENT_LEN, begin.len());

    let pos = given.len().saturating_sub(FRAGMENT_LEN).min(FRAGMENT_LEN);
    let given_end = slice(&joined, pos, pos + FRAGMENT_LEN);
    let family_end = slice(&family, family.len().saturating_sub(FRAGMENT_LEN), family.len());

    let combinations = [
        (&given_begin, &family_begin),
        (&family_begin, &given_begin),
        (&given_begin, &family_end),
        (&family_end, &given_begin),
        (&given_end, &family_begin),
        (&family_begin, &given_end),
        (&given_end, &family_end),
        (&family_end, &given_end),
    ];

    let mut candidates: Vec<String> = Vec::with_capacity(CANDIDATE_COUNT);
    for (first, second) in combinations {
        let candidate = format!("{first}{second}");
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asciify_folds_umlauts_and_marks() {
        assert_eq!(asciify("Müller-Schön"), "Mueller-Schoen");
        assert_eq!(asciify("  Ängström "), "Aengstroem");
        assert_eq!(asciify("José Gonçalves"), "Jose Goncalves");
        assert_eq!(asciify("Straße"), "Strasse");
    }

    #[test]
    fn mailify_collapses_separators() {
        assert_eq!(mailify("Jan-Peter"), "jan-peter");
        assert_eq!(mailify("Anne  Marie"), "anne-marie");
        assert_eq!(mailify("Dr. Müller"), "dr-mueller");
        assert_eq!(mailify("O'Brien"), "o-brien");
    }

    #[test]
    fn mail_uses_normalized_names() {
        assert_eq!(
            create_mail("Jürgen", "Groß", "example.org"),
            "juergen.gross@example.org"
        );
    }

    #[test]
    fn uid_validation() {
        assert!(is_valid_uid("doejan"));
        assert!(is_valid_uid("abcdefgh"));
        assert!(!is_valid_uid("abcde"));
        assert!(!is_valid_uid("abcdefghi"));
        assert!(!is_valid_uid("doejan1"));
        assert!(!is_valid_uid("döejan"));
    }

    #[test]
    fn viktor_gruber_yields_eight_candidates() {
        let candidates = suggestions("Viktor", "Gruber").unwrap();
        assert_eq!(
            candidates,
            ["vikgru", "gruvik", "vikber", "bervik", "torgru", "grutor", "torber", "bertor"]
        );
    }

    #[test]
    fn suggestions_are_deterministic() {
        assert_eq!(
            suggestions("Jane", "Doerfler").unwrap(),
            suggestions("Jane", "Doerfler").unwrap()
        );
        assert_eq!(suggestions("Jane", "Doerfler").unwrap().len(), CANDIDATE_COUNT);
    }

    #[test]
    fn repetitive_names_collapse_to_one_candidate() {
        assert_eq!(suggestions("Aaa", "Aaaa").unwrap(), ["aaaaaa"]);
    }

    #[test]
    fn short_or_blank_names_are_rejected() {
        let err = suggestions("Al", "Gruber").unwrap_err();
        assert_eq!(err.code(), "user.create.usernames.dontmatch");

        let err = suggestions("Viktor", "Li").unwrap_err();
        assert_eq!(err.code(), "user.create.usernames.dontmatch");

        let err = suggestions(" ", "Gruber").unwrap_err();
        assert_eq!(err.code(), "user.firstname.required");

        let err = suggestions("Viktor", "").unwrap_err();
        assert_eq!(err.code(), "user.surname.required");
    }
}
