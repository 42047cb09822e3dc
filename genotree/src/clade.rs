/// One node of a similarity tree.
///
/// Leaves stand for the rows of the clustered matrix, internal nodes for
/// merges. Every node owns its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Clade {
    label: Option<String>,
    leaf_index: Option<usize>,
    branch_length: f64,
    children: Vec<Clade>,
    size: usize,
}

impl Clade {
    #[must_use]
    pub fn new_leaf<T: Into<String>>(leaf_index: usize, label: T) -> Self {
        Self {
            label: Some(label.into()),
            leaf_index: Some(leaf_index),
            branch_length: 0.0,
            children: Vec::new(),
            size: 1,
        }
    }

    /// Creates an unlabelled internal node.
    ///
    /// # Panics
    /// Panics if `children` is empty.
    #[must_use]
    pub fn new_node<T: Into<Vec<Clade>>>(children: T) -> Self {
        let children = children.into();
        assert!(!children.is_empty());
        let size = children.iter().map(Clade::size).sum();

        Self {
            label: None,
            leaf_index: None,
            branch_length: 0.0,
            children,
            size,
        }
    }

    #[must_use]
    pub fn with_label<T: Into<String>>(mut self, label: T) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Row of the clustered matrix this leaf stands for.
    #[must_use]
    pub fn leaf_index(&self) -> Option<usize> {
        self.leaf_index
    }

    /// Length of the edge to the parent node.
    #[must_use]
    pub fn branch_length(&self) -> f64 {
        self.branch_length
    }

    /// Sets the length of the edge to the parent node; negative values are
    /// stored as 0.
    pub fn set_branch_length(&mut self, branch_length: f64) {
        self.branch_length = branch_length.max(0.0);
    }

    #[must_use]
    pub fn children(&self) -> &[Clade] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of leaves under (and including) this node.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Leaf indices in depth-first order, i.e. the order the leaves appear in
    /// the Newick notation.
    #[must_use]
    pub fn leaf_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.size);
        let mut stack = vec![self];

        while let Some(clade) = stack.pop() {
            if let Some(index) = clade.leaf_index {
                order.push(index);
            }
            stack.extend(clade.children.iter().rev());
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use crate::clade::Clade;

    fn sample_tree() -> Clade {
        let left = Clade::new_node(vec![Clade::new_leaf(2, "C"), Clade::new_leaf(0, "A")]);
        Clade::new_node(vec![left, Clade::new_leaf(1, "B")])
    }

    #[test]
    fn test_size() {
        let tree = sample_tree();

        assert_eq!(tree.size(), 3);
        assert_eq!(tree.children()[0].size(), 2);
        assert!(tree.children()[1].is_leaf());
    }

    #[test]
    fn test_leaf_order() {
        assert_eq!(sample_tree().leaf_order(), [2, 0, 1]);
        assert_eq!(Clade::new_leaf(5, "x").leaf_order(), [5]);
    }

    #[test]
    fn test_branch_length_is_never_negative() {
        let mut leaf = Clade::new_leaf(0, "A");
        leaf.set_branch_length(-1e-17);
        assert_eq!(leaf.branch_length(), 0.0);

        leaf.set_branch_length(0.5);
        assert_eq!(leaf.branch_length(), 0.5);
    }

    #[test]
    fn test_labels() {
        let node = Clade::new_node(vec![Clade::new_leaf(0, "A")]).with_label("root");

        assert_eq!(node.label(), Some("root"));
        assert_eq!(node.leaf_index(), None);
        assert_eq!(node.children()[0].label(), Some("A"));
    }
}
