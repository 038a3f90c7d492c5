use super::*;

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub(crate) fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        self.create_node(Some(parent), NodeType::Element(Element { tag_name, attrs }))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id.0)
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.node(node_id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.node(node_id)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self, node_id: NodeId) -> Option<&mut String> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.node(node_id)?.parent
    }

    pub(crate) fn attribute(&self, node_id: NodeId, name: &str) -> Option<&str> {
        let element = self.element(node_id)?;
        element
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        if self.element(node_id).is_some() {
            out.push(node_id);
        }
        for child in self.children(node_id) {
            self.collect_elements_dfs(*child, out);
        }
    }

    pub(crate) fn collect_elements_descendants_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(node_id) {
            self.collect_elements_dfs(*child, out);
        }
    }

    pub(crate) fn all_element_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements_dfs(self.root, &mut out);
        out
    }

    /// First connected element in document order carrying `id`.
    pub(crate) fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_element_dfs(self.root, &|element| {
            element.attrs.get("id").is_some_and(|value| value == id)
        })
    }

    fn find_element_dfs(&self, node_id: NodeId, pred: &dyn Fn(&Element) -> bool) -> Option<NodeId> {
        if self.element(node_id).is_some_and(pred) {
            return Some(node_id);
        }
        self.children(node_id)
            .iter()
            .find_map(|child| self.find_element_dfs(*child, pred))
    }

    pub(crate) fn elements_by_tag_name(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        let mut all = Vec::new();
        self.collect_elements_descendants_dfs(scope, &mut all);
        if tag == "*" {
            return all;
        }
        all.into_iter()
            .filter(|node| {
                self.tag_name(*node)
                    .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            })
            .collect()
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.push_text(node_id, false, &mut out);
        out
    }

    /// Like `text_content`, minus the bodies of `script` and `style`.
    pub(crate) fn inner_text(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.push_text(node_id, true, &mut out);
        out
    }

    fn push_text(&self, node_id: NodeId, rendered_only: bool, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(text) => out.push_str(text),
            NodeType::Element(element)
                if rendered_only
                    && (element.tag_name.eq_ignore_ascii_case("script")
                        || element.tag_name.eq_ignore_ascii_case("style")) => {}
            NodeType::Document | NodeType::Element(_) => {
                for child in &node.children {
                    self.push_text(*child, rendered_only, out);
                }
            }
        }
    }

    pub(crate) fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = self.children(parent);
        let pos = children.iter().position(|id| *id == node_id)?;
        children
            .iter()
            .skip(pos + 1)
            .copied()
            .find(|sibling| self.element(*sibling).is_some())
    }

    pub(crate) fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let parent = self.parent(node_id)?;
        let children = self.children(parent);
        let pos = children.iter().position(|id| *id == node_id)?;
        children[..pos]
            .iter()
            .rev()
            .copied()
            .find(|sibling| self.element(*sibling).is_some())
    }

    pub(crate) fn document_title(&self) -> String {
        self.elements_by_tag_name(self.root, "title")
            .first()
            .map(|node| self.text_content(*node).trim().to_string())
            .unwrap_or_default()
    }

    pub(crate) fn set_document_title(&mut self, title: &str) -> Result<()> {
        let existing = self.elements_by_tag_name(self.root, "title").first().copied();
        let title_node = match existing {
            Some(node) => node,
            None => {
                let parent = self
                    .elements_by_tag_name(self.root, "head")
                    .first()
                    .copied()
                    .or_else(|| self.elements_by_tag_name(self.root, "html").first().copied())
                    .unwrap_or(self.root);
                self.create_element(parent, "title".to_string(), HashMap::new())
            }
        };
        self.set_text_content(title_node, title)
    }
}
