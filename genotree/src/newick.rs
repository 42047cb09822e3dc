use std::io;
use std::io::Write;

use crate::clade::Clade;

const QUOTE: char = '\'';
const METACHARACTERS: &[char] = &['(', ')', '[', ']', ':', ';', ',', QUOTE];

/// Serializes a tree in the Newick notation, terminated by `;`.
///
/// Every node except the root gets a `:` branch length suffix.
///
/// # Examples
/// ```
/// use genotree::clade::Clade;
/// use genotree::newick::to_newick;
///
/// let mut a = Clade::new_leaf(0, "A");
/// let mut b = Clade::new_leaf(1, "sample B");
/// a.set_branch_length(0.5);
/// b.set_branch_length(1.25);
/// let root = Clade::new_node(vec![a, b]);
///
/// assert_eq!(to_newick(&root), "(A:0.5,'sample B':1.25);");
/// ```
#[must_use]
pub fn to_newick(root: &Clade) -> String {
    let mut output = String::new();
    write_clade(root, true, &mut output);
    output.push(';');
    output
}

/// Writes the Newick notation of a tree followed by a newline.
pub fn write_newick<W: Write>(root: &Clade, mut writer: W) -> io::Result<()> {
    writeln!(writer, "{}", to_newick(root))
}

fn write_clade(clade: &Clade, is_root: bool, output: &mut String) {
    if !clade.is_leaf() {
        output.push('(');
        for (index, child) in clade.children().iter().enumerate() {
            if index > 0 {
                output.push(',');
            }
            write_clade(child, false, output);
        }
        output.push(')');
    }

    if let Some(label) = clade.label() {
        write_label(label, output);
    }

    if !is_root {
        output.push(':');
        output.push_str(&clade.branch_length().to_string());
    }
}

fn write_label(label: &str, output: &mut String) {
    let needs_quoting = label
        .chars()
        .any(|ch| ch.is_whitespace() || METACHARACTERS.contains(&ch));

    if needs_quoting {
        output.push(QUOTE);
        for ch in label.chars() {
            if ch == QUOTE {
                output.push(QUOTE);
            }
            output.push(ch);
        }
        output.push(QUOTE);
    } else {
        output.push_str(label);
    }
}

#[cfg(test)]
mod tests {
    use crate::clade::Clade;
    use crate::newick::{to_newick, write_newick};

    fn leaf(index: usize, label: &str, branch_length: f64) -> Clade {
        let mut clade = Clade::new_leaf(index, label);
        clade.set_branch_length(branch_length);
        clade
    }

    fn node(children: Vec<Clade>, branch_length: f64) -> Clade {
        let mut clade = Clade::new_node(children);
        clade.set_branch_length(branch_length);
        clade
    }

    #[test]
    fn test_nested_tree() {
        let root = node(
            vec![
                node(vec![leaf(0, "A", 0.5), leaf(1, "B", 0.5)], 1.5),
                node(vec![leaf(2, "C", 1.0), leaf(3, "D", 1.0)], 1.0),
            ],
            0.0,
        );

        assert_eq!(to_newick(&root), "((A:0.5,B:0.5):1.5,(C:1,D:1):1);");
    }

    #[test]
    fn test_single_leaf() {
        assert_eq!(to_newick(&leaf(0, "only", 3.0)), "only;");
    }

    #[test]
    fn test_internal_label() {
        let root = Clade::new_node(vec![leaf(0, "A", 0.1)]).with_label("anc");

        assert_eq!(to_newick(&root), "(A:0.1)anc;");
    }

    #[test]
    fn test_quoted_labels() {
        let root = node(
            vec![
                leaf(0, "O'Brien", 1.0),
                leaf(1, "x:y", 2.0),
                leaf(2, "tab\tsep", 0.25),
                leaf(3, "plain_name", 0.0),
            ],
            0.0,
        );

        assert_eq!(
            to_newick(&root),
            "('O''Brien':1,'x:y':2,'tab\tsep':0.25,plain_name:0);"
        );
    }

    #[test]
    fn test_write_newick() {
        let root = node(vec![leaf(0, "A", 0.5), leaf(1, "B", 0.5)], 0.0);
        let mut output = Vec::new();
        write_newick(&root, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "(A:0.5,B:0.5);\n");
    }
}
