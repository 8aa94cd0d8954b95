//! Identifier casing used for schema registry keys and generated operation ids.
//!
//! Words are split on any non-alphanumeric character, on a lower-to-upper
//! transition (`myType` -> `my`, `Type`) and at the end of an acronym
//! (`XMLHttp` -> `XML`, `Http`). Digits stay attached to the word they follow.

/// Split an arbitrary identifier into its words.
#[must_use]
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let lower_to_upper = (prev.is_lowercase() || prev.is_ascii_digit()) && c.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if lower_to_upper || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// `my type-a` -> `MyTypeA`
#[must_use]
pub fn pascal_case(input: &str) -> String {
    split_words(input).iter().map(|w| capitalize(w)).collect()
}

/// `/pets/:id GET` -> `petsIdGet`
#[must_use]
pub fn camel_case(input: &str) -> String {
    let words = split_words(input);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_normalizes_separators_and_case() {
        assert_eq!(pascal_case("my type a"), "MyTypeA");
        assert_eq!(pascal_case("MyTypeA"), "MyTypeA");
        assert_eq!(pascal_case("test_response-inner"), "TestResponseInner");
        assert_eq!(pascal_case("XMLHttpRequest"), "XmlHttpRequest");
        assert_eq!(pascal_case("v1 pet"), "V1Pet");
        assert_eq!(pascal_case("!!!"), "");
    }

    #[test]
    fn camel_case_builds_operation_ids() {
        assert_eq!(camel_case("pets/:id GET"), "petsIdGet");
        assert_eq!(camel_case(" users POST"), "usersPost");
        assert_eq!(camel_case(""), "");
    }
}
