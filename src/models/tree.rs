use super::result::TestResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    TestType,
    Package,
    DataStream,
    Case,
}

/// Aggregate counts attached to a suite node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuiteCounts {
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
}

#[derive(Debug, Clone)]
pub struct TestNode<'a> {
    pub id: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub kind: NodeKind,
    pub name: String,
    pub counts: Option<SuiteCounts>,
    /// Set for `NodeKind::Case` leaves only.
    pub result: Option<&'a TestResult>,
}

/// Arena tree of suites (test type → package → data stream) with cases as leaves.
#[derive(Debug, Default)]
pub struct TestTree<'a> {
    nodes: Vec<TestNode<'a>>,
    root_ids: Vec<usize>,
}

impl<'a> TestTree<'a> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root_ids: Vec::new(),
        }
    }

    /// Add a root-level node (test type). Returns the node id.
    pub fn add_root(&mut self, kind: NodeKind, name: String) -> usize {
        let id = self.add_node(kind, name, None, None);
        self.root_ids.push(id);
        id
    }

    /// Add a child suite under a parent. Returns the node id.
    pub fn add_child(&mut self, parent_id: usize, kind: NodeKind, name: String) -> usize {
        let id = self.add_node(kind, name, Some(parent_id), None);
        self.nodes[parent_id].children.push(id);
        id
    }

    /// Add a case leaf under a data stream node. Returns the node id.
    pub fn add_case(&mut self, parent_id: usize, result: &'a TestResult) -> usize {
        let id = self.add_node(
            NodeKind::Case,
            result.name.clone(),
            Some(parent_id),
            Some(result),
        );
        self.nodes[parent_id].children.push(id);
        id
    }

    fn add_node(
        &mut self,
        kind: NodeKind,
        name: String,
        parent: Option<usize>,
        result: Option<&'a TestResult>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(TestNode {
            id,
            parent,
            children: Vec::new(),
            kind,
            name,
            counts: None,
            result,
        });
        id
    }

    pub fn get(&self, id: usize) -> Option<&TestNode<'a>> {
        self.nodes.get(id)
    }

    pub fn set_counts(&mut self, id: usize, counts: SuiteCounts) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.counts = Some(counts);
        }
    }

    pub fn roots(&self) -> &[usize] {
        &self.root_ids
    }
}
