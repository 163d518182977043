//! Control page templating
//!
//! Placeholders are `$NAME` or `${NAME}`; `$$` is a literal `$`. Names with
//! no value, and any `$` not starting a placeholder, are left as written.

/// Substitute `vars` into `template`
pub fn render(template: &str, vars: &[(&str, String)]) -> String {
    let lookup = |name: &str| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                if is_identifier(name) {
                    if let Some(value) = lookup(name) {
                        out.push_str(value);
                        rest = &braced[end + 1..];
                        continue;
                    }
                }
            }
            out.push('$');
            rest = after;
            continue;
        }

        let len = identifier_len(after);
        match lookup(&after[..len]) {
            Some(value) if len > 0 => out.push_str(value),
            _ => {
                out.push('$');
                out.push_str(&after[..len]);
            }
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit());
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}
