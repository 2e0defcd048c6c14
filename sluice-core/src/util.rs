/// Splits `input` at the end of the longest prefix matching `predicate`, advancing the slice.
pub fn consume_while<'s>(input: &mut &'s str, mut predicate: impl FnMut(&char) -> bool) -> &'s str {
    let len = input
        .char_indices()
        .find(|(_, c)| !predicate(c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (result, rest) = input.split_at(len);
    *input = rest;
    result
}

/// Lower snake case, every uppercase letter after the first character starts a new word.
///
/// ```rust
/// use sluice_core::to_snake_case;
/// assert_eq!(to_snake_case("simpleName"), "simple_name");
/// assert_eq!(to_snake_case("IOError"), "i_o_error");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Longest prefix of `value` not exceeding `max` bytes, cut on a char boundary.
pub fn truncated(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::truncated(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}
