use std::collections::HashSet;

use super::*;

impl Dom {
    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let all = self.query_selector_all(selector)?;
        Ok(all.into_iter().next())
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let candidates = self.all_element_nodes();
        self.filter_matching(candidates, selector)
    }

    pub(crate) fn query_selector_all_from(
        &self,
        root: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>> {
        let mut candidates = Vec::new();
        self.collect_elements_descendants_dfs(root, &mut candidates);
        self.filter_matching(candidates, selector)
    }

    fn filter_matching(&self, candidates: Vec<NodeId>, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector).map_err(|err| match err {
            Error::UnsupportedSelector(_) => Error::UnsupportedSelector(selector.to_string()),
            other => other,
        })?;

        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for candidate in candidates {
            if groups
                .iter()
                .any(|steps| self.matches_selector_chain(candidate, steps))
                && seen.insert(candidate)
            {
                matched.push(candidate);
            }
        }
        Ok(matched)
    }

    pub(crate) fn matches_selector_chain(&self, node_id: NodeId, steps: &[SelectorPart]) -> bool {
        let Some((last, rest)) = steps.split_last() else {
            return false;
        };
        self.matches_step(node_id, &last.step) && self.matches_chain_prefix(node_id, last, rest)
    }

    // `part` already matched `node_id`; checks the steps to its left, backtracking
    // through every ancestor or earlier sibling that could satisfy the combinator.
    fn matches_chain_prefix(
        &self,
        node_id: NodeId,
        part: &SelectorPart,
        rest: &[SelectorPart],
    ) -> bool {
        let Some((prev, earlier)) = rest.split_last() else {
            return true;
        };
        let try_candidate = |candidate: NodeId| {
            self.matches_step(candidate, &prev.step)
                && self.matches_chain_prefix(candidate, prev, earlier)
        };

        match part.combinator.unwrap_or(SelectorCombinator::Descendant) {
            SelectorCombinator::Child => self.parent(node_id).is_some_and(try_candidate),
            SelectorCombinator::AdjacentSibling => {
                self.previous_element_sibling(node_id).is_some_and(try_candidate)
            }
            SelectorCombinator::Descendant => {
                let mut cursor = self.parent(node_id);
                while let Some(ancestor) = cursor {
                    if try_candidate(ancestor) {
                        return true;
                    }
                    cursor = self.parent(ancestor);
                }
                false
            }
            SelectorCombinator::GeneralSibling => {
                let mut cursor = self.previous_element_sibling(node_id);
                while let Some(sibling) = cursor {
                    if try_candidate(sibling) {
                        return true;
                    }
                    cursor = self.previous_element_sibling(sibling);
                }
                false
            }
        }
    }

    pub(crate) fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };

        if let Some(tag) = &step.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &step.id {
            if element.attrs.get("id") != Some(id) {
                return false;
            }
        }

        if step
            .classes
            .iter()
            .any(|class_name| !has_class(element, class_name))
        {
            return false;
        }

        if !step
            .attrs
            .iter()
            .all(|cond| attr_condition_matches(element, cond))
        {
            return false;
        }

        step.pseudo_classes
            .iter()
            .all(|pseudo| self.matches_pseudo(node_id, element, pseudo))
    }

    fn matches_pseudo(
        &self,
        node_id: NodeId,
        element: &Element,
        pseudo: &SelectorPseudoClass,
    ) -> bool {
        match pseudo {
            SelectorPseudoClass::FirstChild => self.previous_element_sibling(node_id).is_none(),
            SelectorPseudoClass::LastChild => self.next_element_sibling(node_id).is_none(),
            SelectorPseudoClass::OnlyChild => {
                self.previous_element_sibling(node_id).is_none()
                    && self.next_element_sibling(node_id).is_none()
            }
            SelectorPseudoClass::FirstOfType => self
                .position_among_siblings(node_id, true)
                .is_some_and(|(index, _)| index == 1),
            SelectorPseudoClass::LastOfType => self
                .position_among_siblings(node_id, true)
                .is_some_and(|(index, total)| index == total),
            SelectorPseudoClass::OnlyOfType => self
                .position_among_siblings(node_id, true)
                .is_some_and(|(_, total)| total == 1),
            SelectorPseudoClass::Checked => {
                element.attrs.contains_key("checked") || element.attrs.contains_key("selected")
            }
            SelectorPseudoClass::Disabled => element.attrs.contains_key("disabled"),
            SelectorPseudoClass::Enabled => !element.attrs.contains_key("disabled"),
            SelectorPseudoClass::Empty => self.children(node_id).is_empty(),
            SelectorPseudoClass::NthChild(selector) => self
                .position_among_siblings(node_id, false)
                .is_some_and(|(index, _)| nth_index_matches(index, selector)),
            SelectorPseudoClass::NthLastChild(selector) => self
                .position_among_siblings(node_id, false)
                .is_some_and(|(index, total)| nth_index_matches(total + 1 - index, selector)),
            SelectorPseudoClass::NthOfType(selector) => self
                .position_among_siblings(node_id, true)
                .is_some_and(|(index, _)| nth_index_matches(index, selector)),
            SelectorPseudoClass::NthLastOfType(selector) => self
                .position_among_siblings(node_id, true)
                .is_some_and(|(index, total)| nth_index_matches(total + 1 - index, selector)),
            SelectorPseudoClass::Is(inners) | SelectorPseudoClass::Where(inners) => inners
                .iter()
                .any(|inner| self.matches_selector_chain(node_id, inner)),
            SelectorPseudoClass::Not(inners) => !inners
                .iter()
                .any(|inner| self.matches_selector_chain(node_id, inner)),
            SelectorPseudoClass::Has(inners) => {
                let mut descendants = Vec::new();
                self.collect_elements_descendants_dfs(node_id, &mut descendants);
                inners.iter().any(|inner| {
                    descendants
                        .iter()
                        .any(|target| self.matches_selector_chain(*target, inner))
                })
            }
        }
    }

    /// 1-based index of `node_id` among its element siblings and the sibling
    /// count, optionally restricted to siblings with the same tag.
    fn position_among_siblings(&self, node_id: NodeId, same_type: bool) -> Option<(usize, usize)> {
        let parent = self.parent(node_id)?;
        let tag_name = self.tag_name(node_id)?;
        let mut total = 0usize;
        let mut target = None;
        for child in self.children(parent) {
            let Some(element) = self.element(*child) else {
                continue;
            };
            if same_type && !element.tag_name.eq_ignore_ascii_case(tag_name) {
                continue;
            }
            total += 1;
            if *child == node_id {
                target = Some(total);
            }
        }
        target.map(|index| (index, total))
    }
}

fn attr_condition_matches(element: &Element, cond: &SelectorAttrCondition) -> bool {
    match cond {
        SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
        SelectorAttrCondition::Eq { key, value } => element.attrs.get(key) == Some(value),
        SelectorAttrCondition::StartsWith { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.starts_with(value)),
        SelectorAttrCondition::EndsWith { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.ends_with(value)),
        SelectorAttrCondition::Contains { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| !value.is_empty() && attr.contains(value)),
        SelectorAttrCondition::Includes { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
        SelectorAttrCondition::DashMatch { key, value } => element
            .attrs
            .get(key)
            .is_some_and(|attr| attr == value || attr.starts_with(&format!("{value}-"))),
    }
}

fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|name| name == class_name))
}

fn nth_index_matches(index: usize, selector: &NthChildSelector) -> bool {
    match selector {
        NthChildSelector::Exact(expected) => index == *expected,
        NthChildSelector::Odd => index % 2 == 1,
        NthChildSelector::Even => index % 2 == 0,
        NthChildSelector::AnPlusB(a, b) => {
            let diff = index as i64 - *b;
            if *a == 0 {
                return diff == 0;
            }
            diff % *a == 0 && (diff / *a) >= 0
        }
    }
}
