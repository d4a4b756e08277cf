//! Parser for the TSRG2 mapping format.
//!
//! Line-oriented UTF-8 text: a `tsrg2` header declares the number of name
//! columns, class lines carry no indentation, member lines one tab, parameter
//! lines two tabs. Writing the format is unsupported.

use lumen_classfile::parse_method_descriptor;

use crate::error::MappingError;
use crate::table::SymbolTable;

const HEADER_PREFIX: &str = "tsrg2 ";

struct MethodContext {
    owner: String,
    name: String,
    descriptor: String,
    /// Local-variable slot for each declared parameter position.
    slots: Vec<u16>,
}

pub fn parse_tsrg2(text: &str) -> Result<SymbolTable, MappingError> {
    let mut table = SymbolTable::default();
    let mut name_columns = 0usize;
    let mut current_class: Option<String> = None;
    let mut current_method: Option<MethodContext> = None;

    for raw in text.lines() {
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(HEADER_PREFIX) {
            name_columns = line.split(' ').count() - 1;
            if name_columns < 2 {
                return Err(malformed(line));
            }
            continue;
        }

        let mut tokens: Vec<&str> = line.split(' ').collect();
        // A comment stripped mid-line can leave trailing separators; they do
        // not count as columns.
        while tokens.last() == Some(&"") {
            tokens.pop();
        }
        let first = match tokens.first() {
            Some(first) => *first,
            None => continue,
        };

        if let Some(rest) = first.strip_prefix("\t\t") {
            // Parameter line.
            let method = current_method
                .as_mut()
                .ok_or_else(|| malformed(line))?;
            if tokens.len() == 1 && rest == "static" {
                // The method is static after all: drop the implicit receiver
                // slot from every precomputed parameter position.
                for slot in &mut method.slots {
                    *slot = slot.checked_sub(1).ok_or_else(|| malformed(line))?;
                }
            } else if tokens.len() == name_columns + 1 {
                let position: usize = rest.parse().map_err(|_| malformed(line))?;
                let slot = *method.slots.get(position).ok_or_else(|| malformed(line))?;
                table.insert_param(
                    &method.owner,
                    &method.name,
                    &method.descriptor,
                    slot,
                    tokens[2],
                );
            } else {
                return Err(malformed(line));
            }
        } else if let Some(rest) = first.strip_prefix('\t') {
            // Member line.
            let owner = current_class.as_deref().ok_or_else(|| malformed(line))?;
            if tokens.len() == name_columns {
                table.insert_field(owner, rest, None, tokens[1]);
            } else if tokens.len() == name_columns + 1 {
                if tokens[1].starts_with('(') {
                    let descriptor = tokens[1];
                    let parsed =
                        parse_method_descriptor(descriptor).map_err(|_| malformed(line))?;
                    let mut slots = Vec::with_capacity(parsed.params.len());
                    let mut slot = 1u16;
                    for param in &parsed.params {
                        slots.push(slot);
                        slot += param.word_size();
                    }
                    table.insert_method(owner, rest, descriptor, tokens[2]);
                    current_method = Some(MethodContext {
                        owner: owner.to_string(),
                        name: rest.to_string(),
                        descriptor: descriptor.to_string(),
                        slots,
                    });
                } else {
                    table.insert_field(owner, rest, Some(tokens[1]), tokens[2]);
                    current_method = None;
                }
            } else {
                return Err(malformed(line));
            }
        } else {
            // Class line.
            if tokens.len() != name_columns {
                return Err(malformed(line));
            }
            if first.ends_with('/') {
                // Package prefix, not a class mapping.
                continue;
            }
            table.insert_class(first, tokens[1]);
            current_class = Some(first.to_string());
        }
    }

    Ok(table)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn malformed(line: &str) -> MappingError {
    MappingError::MalformedLine {
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
tsrg2 obf deobf
a/B b/C
\tfd health
\tmd (IJI)V tick
\t\t0 p0 entity
\t\t2 p2 partial
\ta/b$ Lfoo; registry
pkg/ pkg/
d/E f/G
";

    #[test]
    fn parses_classes_fields_methods_and_params() {
        let table = parse_tsrg2(SAMPLE).unwrap();
        assert_eq!(table.class("a/B"), Some("b/C"));
        assert_eq!(table.class("d/E"), Some("f/G"));
        assert_eq!(table.class_reverse("b/C"), Some("a/B"));
        assert_eq!(table.field("a/B", "fd"), Some("health"));
        let method = table.method("a/B", "md", "(IJI)V").unwrap();
        assert_eq!(method.deobf, "tick");
        // Parameter positions resolve through word-size slots: I J I → 1 2 4.
        assert_eq!(method.param(1), Some("entity"));
        assert_eq!(method.param(4), Some("partial"));
        assert_eq!(method.param(2), None);
        // Three-column field form.
        assert_eq!(table.field("a/B", "a/b$"), Some("registry"));
    }

    #[test]
    fn package_lines_create_no_mapping() {
        let table = parse_tsrg2(SAMPLE).unwrap();
        assert_eq!(table.class("pkg/"), None);
    }

    #[test]
    fn static_marker_shifts_parameter_slots() {
        let text = "\
tsrg2 obf deobf
a/B b/C
\tmd (IJ)V tick
\t\tstatic
\t\t0 p0 flags
\t\t1 p1 time
";
        let table = parse_tsrg2(text).unwrap();
        let method = table.method("a/B", "md", "(IJ)V").unwrap();
        assert_eq!(method.param(0), Some("flags"));
        assert_eq!(method.param(1), Some("time"));
    }

    #[test]
    fn wrong_column_count_cites_the_line() {
        let text = "tsrg2 obf deobf\na/B\n";
        let err = parse_tsrg2(text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to process line: `a/B`"
        );
    }

    #[test]
    fn member_line_without_class_is_rejected() {
        let err = parse_tsrg2("tsrg2 obf deobf\n\tfd health\n").unwrap_err();
        assert!(err.to_string().contains("\tfd health"));
    }

    #[test]
    fn parameter_line_without_method_is_rejected() {
        let err = parse_tsrg2("tsrg2 obf deobf\na/B b/C\n\t\t0 p0 x\n").unwrap_err();
        assert!(err.to_string().contains("0 p0 x"));
    }

    #[test]
    fn out_of_range_parameter_position_is_rejected() {
        let text = "tsrg2 obf deobf\na/B b/C\n\tmd (I)V tick\n\t\t5 p5 x\n";
        assert!(parse_tsrg2(text).is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# header comment\ntsrg2 obf deobf\n\na/B b/C # trailing\n";
        let table = parse_tsrg2(text).unwrap();
        assert_eq!(table.class("a/B"), Some("b/C"));
    }

    #[test]
    fn lines_before_the_header_are_rejected() {
        assert!(parse_tsrg2("a/B b/C\n").is_err());
    }
}
