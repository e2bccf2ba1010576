//! Brace expansion of config lines.
//!
//! `a.hlsl -D X={1,2} -D Y={a,b}` stands for the four lines with every combination of the
//! alternatives, leftmost group varying slowest. Groups don't nest.

/// A brace group that is never closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing '}}' for the '{{' at column {column}")]
pub struct ExpandError {
    /// 1-based column of the unmatched `{`.
    pub column: usize,
}

/// Expands every `{a,b,...}` group of `line` into the cartesian product of concrete lines.
///
/// # Errors
/// If a `{` has no matching `}`. No lines are produced in that case.
#[inline]
pub fn expand_permutations(line: &str) -> Result<Vec<String>, ExpandError> {
    check_groups(line)?;
    let mut lines = Vec::new();
    expand_into(line, &mut lines);
    Ok(lines)
}

fn check_groups(line: &str) -> Result<(), ExpandError> {
    let mut position = 0;
    while let Some(opening) = line[position..].find('{').map(|found| position + found) {
        let Some(closing) = line[opening..].find('}') else {
            return Err(ExpandError {
                column: opening + 1,
            });
        };
        position = opening + closing + 1;
    }
    Ok(())
}

fn expand_into(line: &str, lines: &mut Vec<String>) {
    let group = line.find('{').and_then(|opening| {
        line[opening..]
            .find('}')
            .map(|found| (opening, opening + found))
    });
    let Some((opening, closing)) = group else {
        lines.push(line.to_owned());
        return;
    };

    let head = &line[..opening];
    let tail = &line[closing + 1..];
    for alternative in line[opening + 1..closing].split(',') {
        expand_into(&format!("{head}{alternative}{tail}"), lines);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn no_groups() {
        assert_eq!(
            expand_permutations("a.hlsl -T ps").unwrap(),
            ["a.hlsl -T ps"]
        );
    }

    #[test_log::test]
    fn leftmost_group_varies_slowest() {
        assert_eq!(
            expand_permutations("s.hlsl -T ps -D A={0,1} -D B={x,y}").unwrap(),
            [
                "s.hlsl -T ps -D A=0 -D B=x",
                "s.hlsl -T ps -D A=0 -D B=y",
                "s.hlsl -T ps -D A=1 -D B=x",
                "s.hlsl -T ps -D A=1 -D B=y",
            ]
        );
    }

    #[test_log::test]
    fn product_of_group_sizes() {
        let lines = expand_permutations("s -D A={0,1,2} -D B={x,y} -D C={p,q,r,s}").unwrap();
        assert_eq!(lines.len(), 3 * 2 * 4);
    }

    #[test_log::test]
    fn empty_group_is_one_empty_alternative() {
        assert_eq!(expand_permutations("s -T ps {}").unwrap(), ["s -T ps "]);
    }

    #[test_log::test]
    fn unclosed_group() {
        assert_eq!(
            expand_permutations("s -D A={0,1").unwrap_err(),
            ExpandError { column: 8 }
        );
        assert_eq!(
            expand_permutations("s -D A={0,1} -D B={").unwrap_err(),
            ExpandError { column: 19 }
        );
    }
}
