//! Graphviz export of fitted trees
//!
//! The DOT layout follows the common `export_graphviz` convention: boxed,
//! rounded, filled nodes coloured by majority class, `True`/`False` labels
//! on the root's edges.

use crate::error::{MetrixError, Result};
use crate::training::{DecisionTree, TreeNode};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Class colours (class 0, class 1)
const CLASS_COLORS: [(f64, f64, f64); 2] = [(229.0, 129.0, 57.0), (57.0, 157.0, 229.0)];

/// Writes DOT descriptions of decision trees
pub struct DotExporter {
    feature_names: Vec<String>,
    precision: usize,
}

impl DotExporter {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            precision: 3,
        }
    }

    /// Decimal places for thresholds and impurities
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Write the DOT description of `tree` to `path`
    pub fn export(&self, tree: &DecisionTree, path: &Path) -> Result<()> {
        let dot = self.export_to_string(tree)?;
        fs::write(path, dot)?;
        debug!(path = %path.display(), "Wrote tree description");
        Ok(())
    }

    pub fn export_to_string(&self, tree: &DecisionTree) -> Result<String> {
        let nodes = tree.nodes();
        if nodes.is_empty() {
            return Err(MetrixError::ModelNotFitted);
        }
        if self.feature_names.len() != tree.n_features() {
            return Err(MetrixError::ShapeError {
                expected: format!("{} feature names", tree.n_features()),
                actual: format!("{} feature names", self.feature_names.len()),
            });
        }

        let mut out = String::new();
        out.push_str("digraph Tree {\n");
        out.push_str("node [shape=box, style=\"filled, rounded\", color=\"black\", fontname=\"helvetica\"] ;\n");
        out.push_str("edge [fontname=\"helvetica\"] ;\n");

        // preorder numbering, children pushed right-first so left is visited first
        let criterion = tree.params.criterion.as_str();
        let mut next_id = 0usize;
        let mut stack: Vec<(usize, Option<usize>)> = vec![(0, None)];
        while let Some((idx, parent)) = stack.pop() {
            let id = next_id;
            next_id += 1;
            let node = &nodes[idx];
            let _ = writeln!(
                out,
                "{} [label=\"{}\", fillcolor=\"{}\"] ;",
                id,
                self.node_label(node, criterion),
                fill_color(node)
            );
            if let Some(parent_id) = parent {
                let _ = match parent_id {
                    0 if id == 1 => writeln!(
                        out,
                        "{} -> {} [labeldistance=2.5, labelangle=45, headlabel=\"True\"] ;",
                        parent_id, id
                    ),
                    0 => writeln!(
                        out,
                        "{} -> {} [labeldistance=2.5, labelangle=-45, headlabel=\"False\"] ;",
                        parent_id, id
                    ),
                    _ => writeln!(out, "{} -> {} ;", parent_id, id),
                };
            }
            if let TreeNode::Split { left, right, .. } = node {
                stack.push((*right, Some(id)));
                stack.push((*left, Some(id)));
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn node_label(&self, node: &TreeNode, criterion: &str) -> String {
        let p = self.precision;
        let mut lines = Vec::with_capacity(4);
        if let TreeNode::Split {
            feature_idx,
            threshold,
            ..
        } = node
        {
            lines.push(format!(
                "{} <= {:.*}",
                escape_dot(&self.feature_names[*feature_idx]),
                p,
                threshold
            ));
        }
        lines.push(format!("{} = {:.*}", criterion, p, node.impurity()));
        lines.push(format!("samples = {}", node.n_samples()));
        let value = node.value();
        lines.push(format!(
            "value = [{}, {}]",
            format_count(value[0], p),
            format_count(value[1], p)
        ));
        lines.join("\\n")
    }
}

fn format_count(v: f64, precision: usize) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.*}", precision, v)
    }
}

/// Quote-safe text for a DOT string literal
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Majority-class colour faded toward white by node purity
fn fill_color(node: &TreeNode) -> String {
    let proba = node.proba();
    let (major, minor) = if proba[1] > proba[0] { (1, 0) } else { (0, 1) };
    let alpha = if proba[minor] < 1.0 {
        (proba[major] - proba[minor]) / (1.0 - proba[minor])
    } else {
        0.0
    };
    let (r, g, b) = CLASS_COLORS[major];
    let blend = |c: f64| (alpha * c + (1.0 - alpha) * 255.0).round() as u8;
    format!("#{:02x}{:02x}{:02x}", blend(r), blend(g), blend(b))
}

/// Render a DOT file to PNG with the Graphviz `dot` program (or a substitute)
pub fn render_png(program: &str, dot_file: &Path, png_file: &Path) -> Result<()> {
    let status = Command::new(program)
        .arg("-Tpng")
        .arg(dot_file)
        .arg("-o")
        .arg(png_file)
        .status()
        .map_err(|e| MetrixError::ExternalTool {
            program: program.to_string(),
            detail: e.to_string(),
        })?;
    if !status.success() {
        return Err(MetrixError::ExternalTool {
            program: program.to_string(),
            detail: format!("exited with {}", status),
        });
    }
    debug!(png = %png_file.display(), "Rendered tree");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TreeParams;
    use ndarray::array;

    fn stump() -> DecisionTree {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(TreeParams::default());
        tree.fit(&x, &y).unwrap();
        tree
    }

    #[test]
    fn test_dot_layout() {
        let names = vec!["Vcell/Vm<Ma>".to_string(), "say \"hi\"".to_string()];
        let dot = DotExporter::new(names).export_to_string(&stump()).unwrap();

        assert!(dot.starts_with("digraph Tree {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("0 [label=\"Vcell/Vm<Ma> <= 2.500\\ngini = 0.500\\nsamples = 4\\nvalue = [2, 2]\""));
        assert!(dot.contains("0 -> 1 [labeldistance=2.5, labelangle=45, headlabel=\"True\"]"));
        assert!(dot.contains("0 -> 2 [labeldistance=2.5, labelangle=-45, headlabel=\"False\"]"));
        assert!(dot.contains("fillcolor=\"#e58139\""));
        assert!(dot.contains("fillcolor=\"#399de5\""));
        assert!(dot.contains("fillcolor=\"#ffffff\""));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_dot("a\"b\\c"), "a\\\"b\\\\c");
    }

    #[test]
    fn test_feature_name_count_checked() {
        let err = DotExporter::new(vec!["a".into()]).export_to_string(&stump());
        assert!(err.is_err());
    }

    #[test]
    fn test_unfitted_tree() {
        let tree = DecisionTree::new(TreeParams::default());
        assert!(DotExporter::new(vec![]).export_to_string(&tree).is_err());
    }

    #[test]
    fn test_missing_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let dot = dir.path().join("t.dot");
        fs::write(&dot, "digraph Tree {}\n").unwrap();
        let err = render_png("definitely-not-a-graphviz-binary", &dot, &dir.path().join("t.png"));
        assert!(matches!(err, Err(MetrixError::ExternalTool { .. })));
    }
}
