// src/filters/hierarchy.rs
// Dependency graph between filters: which filters constrain which

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::definitions::{FilterDefinition, FilterEdge, HierarchyDescription};
use super::error::{FilterError, FilterResult};

/// Validated, immutable filter dependency DAG.
#[derive(Debug, Clone)]
pub struct FilterHierarchy {
    /// Sorted by display order, then declaration order.
    definitions: Vec<FilterDefinition>,
    index: HashMap<String, usize>,
    parents: HashMap<String, Vec<String>>,
    children: HashMap<String, Vec<String>>,
    edges: Vec<FilterEdge>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

impl FilterHierarchy {
    /// Build the hierarchy, rejecting duplicate codes, filters without a
    /// source column, edges naming undeclared filters, and cycles.
    pub fn build(description: &HierarchyDescription) -> FilterResult<Self> {
        let mut definitions = description.filters.clone();
        // Stable sort keeps declaration order among equal display orders
        definitions.sort_by_key(|d| d.display_order);

        let mut index = HashMap::with_capacity(definitions.len());
        for (i, definition) in definitions.iter().enumerate() {
            if index.insert(definition.code.clone(), i).is_some() {
                return Err(FilterError::DuplicateFilter(definition.code.clone()));
            }
            if definition.table.trim().is_empty() || definition.column.trim().is_empty() {
                return Err(FilterError::InvalidIdentifier(format!(
                    "filter '{}' needs both a table and a column",
                    definition.code
                )));
            }
        }

        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut edges: Vec<FilterEdge> = Vec::with_capacity(description.edges.len());
        for edge in &description.edges {
            for code in [&edge.parent, &edge.child] {
                if !index.contains_key(code) {
                    return Err(FilterError::UnknownFilter(code.clone()));
                }
            }
            if edges.contains(edge) {
                continue;
            }
            parents.entry(edge.child.clone()).or_default().push(edge.parent.clone());
            children.entry(edge.parent.clone()).or_default().push(edge.child.clone());
            edges.push(edge.clone());
        }

        let hierarchy = Self {
            definitions,
            index,
            parents,
            children,
            edges,
        };
        hierarchy.check_acyclic()?;

        bevy::log::debug!(
            "Built filter hierarchy: {} filters, {} edges, roots {:?}",
            hierarchy.definitions.len(),
            hierarchy.edges.len(),
            hierarchy.roots().map(|d| d.code.as_str()).collect::<Vec<_>>()
        );
        Ok(hierarchy)
    }

    /// Depth-first white/gray/black traversal over child edges. Reaching a
    /// gray node means the current path loops back on itself.
    fn check_acyclic(&self) -> FilterResult<()> {
        fn visit(
            code: &str,
            hierarchy: &FilterHierarchy,
            marks: &mut HashMap<String, Mark>,
            path: &mut Vec<String>,
        ) -> FilterResult<()> {
            marks.insert(code.to_string(), Mark::Gray);
            path.push(code.to_string());

            for child in hierarchy.children(code) {
                match marks.get(child).copied().unwrap_or(Mark::White) {
                    Mark::Gray => {
                        let start = path.iter().position(|c| c == child).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(child.clone());
                        return Err(FilterError::CycleDetected { path: cycle });
                    }
                    Mark::White => visit(child, hierarchy, marks, path)?,
                    Mark::Black => {}
                }
            }

            path.pop();
            marks.insert(code.to_string(), Mark::Black);
            Ok(())
        }

        let mut marks: HashMap<String, Mark> = HashMap::new();
        for definition in &self.definitions {
            if marks.get(&definition.code).copied().unwrap_or(Mark::White) == Mark::White {
                let mut path = Vec::new();
                visit(&definition.code, self, &mut marks, &mut path)?;
            }
        }
        Ok(())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn definition(&self, code: &str) -> Option<&FilterDefinition> {
        self.index.get(code).map(|&i| &self.definitions[i])
    }

    /// Fetch a definition or fail with `UnknownFilter`.
    pub fn require(&self, code: &str) -> FilterResult<&FilterDefinition> {
        self.definition(code)
            .ok_or_else(|| FilterError::UnknownFilter(code.to_string()))
    }

    pub fn definitions(&self) -> &[FilterDefinition] {
        &self.definitions
    }

    pub fn edges(&self) -> &[FilterEdge] {
        &self.edges
    }

    /// Direct parents, in edge declaration order.
    pub fn parents(&self, code: &str) -> &[String] {
        self.parents.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct children, in edge declaration order.
    pub fn children(&self, code: &str) -> &[String] {
        self.children.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_root(&self, code: &str) -> bool {
        self.parents(code).is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &FilterDefinition> {
        self.definitions.iter().filter(|d| self.is_root(&d.code))
    }

    /// Transitive closure of parent edges. Never contains `code` itself.
    pub fn ancestors(&self, code: &str) -> BTreeSet<String> {
        self.closure(code, |c| self.parents(c))
    }

    /// Transitive closure of child edges. Never contains `code` itself.
    pub fn descendants(&self, code: &str) -> BTreeSet<String> {
        self.closure(code, |c| self.children(c))
    }

    fn closure<'a>(&'a self, code: &str, next: impl Fn(&str) -> &'a [String]) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = next(code).iter().map(String::as_str).collect();
        while let Some(current) = stack.pop() {
            if seen.insert(current.to_string()) {
                stack.extend(next(current).iter().map(String::as_str));
            }
        }
        seen
    }

    /// Descendants of `code` grouped by longest-path depth from `code`.
    ///
    /// Every filter lands in a later level than all of its parents that are
    /// themselves part of the cascade, so the first level only holds direct
    /// children. Filters within a level are in display order.
    pub fn cascade_levels(&self, code: &str) -> Vec<Vec<String>> {
        let descendants = self.descendants(code);
        let mut depths: HashMap<&str, usize> = HashMap::new();

        fn depth_of<'a>(
            node: &'a str,
            origin: &str,
            hierarchy: &'a FilterHierarchy,
            descendants: &BTreeSet<String>,
            depths: &mut HashMap<&'a str, usize>,
        ) -> usize {
            if let Some(&d) = depths.get(node) {
                return d;
            }
            let depth = hierarchy
                .parents(node)
                .iter()
                .filter(|p| p.as_str() == origin || descendants.contains(p.as_str()))
                .map(|p| {
                    if p.as_str() == origin {
                        1
                    } else {
                        depth_of(p, origin, hierarchy, descendants, depths) + 1
                    }
                })
                .max()
                .unwrap_or(1);
            depths.insert(node, depth);
            depth
        }

        let mut levels: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for definition in &self.definitions {
            if descendants.contains(&definition.code) {
                let depth = depth_of(&definition.code, code, self, &descendants, &mut depths);
                levels.entry(depth).or_default().push(definition.code.clone());
            }
        }
        levels.into_values().collect()
    }
}
