//! Query execution plan reconstructed from a `query_execution_plan` trace.
//!
//! Plan JSON shape (one node):
//! {
//!   "[type]": "search::queryeval::AndBlueprint",
//!   "[id]": 1,
//!   "strict": true,
//!   "field_name": "title",          // plain index terms
//!   "query_term": "2020",           // leaf terms
//!   "attribute": {                  // attribute terms
//!     "name": "year", "type": "int32", "fast_search": true
//!   },
//!   "children": { "[type]": "std::vector", "[0]": {...}, "[1]": {...} }
//! }

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::sample::{Sample, SampleName, SampleTag};
use crate::render::cell::{Cell, Table};
use crate::value::Inspector;

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryNode {
    pub id: i64,
    pub class_name: String,
    pub field_name: Option<String>,
    pub query_term: Option<String>,
    pub strict: bool,
    pub seeks: u64,
    pub total_time_ms: f64,
    pub self_time_ms: f64,
    pub children: Vec<QueryNode>,
}

/// Strip template arguments, namespaces and a trailing `Blueprint`.
pub fn normalize_class_name(name: &str) -> String {
    let name = name.split('<').next().unwrap_or_default();
    let name = name.rsplit("::").next().unwrap_or_default();
    name.strip_suffix("Blueprint").unwrap_or(name).to_string()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl QueryNode {
    pub fn from_plan(node: Inspector<'_>) -> QueryNode {
        let mut class_name = normalize_class_name(node.field("[type]").as_str());
        let query_term = non_empty(node.field("query_term").as_str());
        let attribute = node.field("attribute");

        let field_name = if query_term.is_some() && attribute.valid() {
            let lookup = if attribute.field("fast_search").as_bool() {
                "fs"
            } else {
                "lookup"
            };
            class_name = format!(
                "Attribute{{{},{}}}",
                attribute.field("type").as_str(),
                lookup
            );
            non_empty(attribute.field("name").as_str())
        } else {
            non_empty(node.field("field_name").as_str())
        };

        let list = node.field("children");
        let children = (0..)
            .map(|i| list.field(&format!("[{i}]")))
            .take_while(Inspector::valid)
            .map(QueryNode::from_plan)
            .collect();

        QueryNode {
            id: node.field("[id]").as_long(),
            class_name,
            field_name,
            query_term,
            strict: node.field("strict").as_bool(),
            children,
            ..Default::default()
        }
    }

    /// Account one sample against this node.
    pub fn add_sample(&mut self, tag: SampleTag, sample: &Sample<'_>) {
        if tag == SampleTag::Seek {
            self.seeks += sample.count();
        }
        self.self_time_ms += sample.self_time_ms();
        if let Some(total) = sample.total_time_ms() {
            self.total_time_ms += total;
        }
    }

    pub fn label(&self) -> String {
        let mut label = self.class_name.clone();
        if let Some(field) = &self.field_name {
            label.push_str(&format!("[{field}]"));
        }
        if let Some(term) = &self.query_term {
            label.push_str(&format!(" '{term}'"));
        }
        label
    }

    fn child_at_path_mut(&mut self, path: &[usize]) -> Option<&mut QueryNode> {
        match path.split_first() {
            None => Some(self),
            Some((&first, rest)) => self.children.get_mut(first)?.child_at_path_mut(rest),
        }
    }
}

/// A plan tree plus an id to child-index-path index.
#[derive(Debug, Clone, Serialize)]
pub struct QueryTree {
    root: QueryNode,
    #[serde(skip)]
    index: BTreeMap<i64, Vec<usize>>,
}

impl QueryTree {
    pub fn extract(plan: Inspector<'_>) -> QueryTree {
        let root = QueryNode::from_plan(plan);
        let mut index = BTreeMap::new();
        let mut path = Vec::new();
        index_node(&root, &mut path, &mut index);
        QueryTree { root, index }
    }

    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    pub fn node_by_id(&self, id: i64) -> Option<&QueryNode> {
        let path = self.index.get(&id)?;
        path.iter()
            .try_fold(&self.root, |node, &i| node.children.get(i))
    }

    /// Apply a sample to the node(s) its name refers to. Returns false, and
    /// changes nothing, when the name does not resolve completely.
    pub fn apply(&mut self, sample: &Sample<'_>) -> bool {
        match SampleName::parse(sample.name()) {
            SampleName::Legacy { path, tag } => {
                if path.is_empty() {
                    return false;
                }
                match self.root.child_at_path_mut(&path) {
                    Some(node) => {
                        node.add_sample(tag, sample);
                        true
                    }
                    None => false,
                }
            }
            SampleName::Enumerated { ids, tag } => {
                let Some(mut paths) = ids
                    .iter()
                    .map(|id| self.index.get(id).cloned())
                    .collect::<Option<Vec<_>>>()
                else {
                    return false;
                };
                // A node listed twice is still one node.
                paths.sort();
                paths.dedup();
                if paths.is_empty() {
                    return false;
                }
                for path in paths {
                    if let Some(node) = self.root.child_at_path_mut(&path) {
                        node.add_sample(tag, sample);
                    }
                }
                true
            }
            SampleName::Unrecognized => false,
        }
    }

    /// Fixed-column performance table with a box-drawn tree column.
    pub fn perf_table(&self) -> Table {
        let mut table = Table::new();
        table
            .add_row(["count", "total_ms", "self_ms", "strict", "query tree"])
            .add_line();
        add_perf_rows(&self.root, "", "", &mut table);
        table
    }
}

fn index_node(node: &QueryNode, path: &mut Vec<usize>, index: &mut BTreeMap<i64, Vec<usize>>) {
    index.entry(node.id).or_insert_with(|| path.clone());
    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        index_node(child, path, index);
        path.pop();
    }
}

fn add_perf_rows(node: &QueryNode, prefix: &str, child_prefix: &str, table: &mut Table) {
    table.add_row([
        Cell::text(node.seeks.to_string()),
        Cell::text(format!("{:.3}", node.total_time_ms)),
        Cell::text(format!("{:.3}", node.self_time_ms)),
        Cell::text(if node.strict { "strict" } else { "" }),
        Cell::text(format!("{prefix}{}", node.label())),
    ]);
    let n = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let (branch, cont) = if i + 1 == n {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        add_perf_rows(
            child,
            &format!("{child_prefix}{branch}"),
            &format!("{child_prefix}{cont}"),
            table,
        );
    }
}

/// Parameters of a nearest neighbor search found in the plan.
#[derive(Debug, Clone, Serialize)]
pub struct NearestNeighbor {
    pub id: i64,
    pub attribute_tensor: String,
    pub query_tensor: String,
    pub target_hits: i64,
    pub adjusted_target_hits: i64,
    pub explore_additional_hits: i64,
    pub algorithm: String,
    pub global_filter_calculated: bool,
    pub global_filter_hit_ratio: f64,
    pub top_k_hits: i64,
}

impl NearestNeighbor {
    pub fn find_all(plan: Inspector<'_>) -> Vec<NearestNeighbor> {
        plan.find_all(|n| normalize_class_name(n.field("[type]").as_str()) == "NearestNeighbor")
            .into_iter()
            .map(|n| NearestNeighbor {
                id: n.field("[id]").as_long(),
                attribute_tensor: n.field("attribute_tensor").as_str().to_string(),
                query_tensor: n.field("query_tensor").as_str().to_string(),
                target_hits: n.field("target_hits").as_long(),
                adjusted_target_hits: n.field("adjusted_target_hits").as_long(),
                explore_additional_hits: n.field("explore_additional_hits").as_long(),
                algorithm: n.field("algorithm").as_str().to_string(),
                global_filter_calculated: n.path(&["global_filter", "calculated"]).as_bool(),
                global_filter_hit_ratio: n.path(&["global_filter", "hit_ratio"]).as_double(),
                top_k_hits: n.field("top_k_hits").as_long(),
            })
            .collect()
    }

    pub fn table(&self, wrap_width: usize) -> Table {
        let mut table = Table::new();
        table.add_row(["property", "value"]).add_line();
        let rows: [(&str, String); 9] = [
            ("attribute tensor", self.attribute_tensor.clone()),
            ("query tensor", self.query_tensor.clone()),
            ("target hits", self.target_hits.to_string()),
            ("adjusted target hits", self.adjusted_target_hits.to_string()),
            ("explore additional hits", self.explore_additional_hits.to_string()),
            ("algorithm", self.algorithm.clone()),
            ("global filter calculated", self.global_filter_calculated.to_string()),
            ("global filter hit ratio", format!("{:.3}", self.global_filter_hit_ratio)),
            ("top k hits", self.top_k_hits.to_string()),
        ];
        for (name, value) in rows {
            table.add_row([Cell::text(name), Cell::wrapped(&value, wrap_width)]);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn plan() -> Value {
        json!({
            "[type]": "search::queryeval::AndBlueprint",
            "[id]": 0,
            "strict": true,
            "children": {
                "[type]": "std::vector",
                "[0]": {
                    "[type]": "search::queryeval::SourceBlenderBlueprint",
                    "[id]": 3
                },
                "[1]": {
                    "[type]": "search::queryeval::OrBlueprint",
                    "[id]": 1,
                    "children": {
                        "[0]": {"[type]": "search::queryeval::EmptyBlueprint", "[id]": 4},
                        "[1]": {"[type]": "search::queryeval::EmptyBlueprint", "[id]": 5},
                        "[2]": {
                            "[type]": "search::attribute::AttributeFieldBlueprint<search::attribute::IntegerAttribute>",
                            "[id]": 2,
                            "query_term": "2020",
                            "attribute": {"name": "year", "type": "int32", "fast_search": true}
                        }
                    }
                },
                "[3]": {"[type]": "skipped because [2] is missing", "[id]": 9}
            }
        })
    }

    fn sample(name: &str) -> Value {
        json!({"name": name, "count": 3, "total_time_ms": 11.0, "self_time_ms": 3.0})
    }

    #[rstest]
    #[case("search::queryeval::AndBlueprint", "And")]
    #[case("search::queryeval::SimpleLeafBlueprint<search::Foo::Bar>", "SimpleLeaf")]
    #[case("NearestNeighborBlueprint", "NearestNeighbor")]
    #[case("Blueprint", "")]
    #[case("", "")]
    fn class_names_are_normalized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_class_name(raw), expected);
    }

    #[test]
    fn extracts_tree() {
        let doc = plan();
        let tree = QueryTree::extract(Inspector::new(&doc));
        let root = tree.root();
        assert_eq!(root.class_name, "And");
        assert!(root.strict);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].class_name, "SourceBlender");

        let attr = &root.children[1].children[2];
        assert_eq!(attr.class_name, "Attribute{int32,fs}");
        assert_eq!(attr.field_name.as_deref(), Some("year"));
        assert_eq!(attr.query_term.as_deref(), Some("2020"));
        assert_eq!(tree.node_by_id(2).map(|n| n.label()), Some(attr.label()));
        assert!(tree.node_by_id(9).is_none());
    }

    #[test]
    fn attribute_without_fast_search_is_lookup() {
        let doc = json!({
            "[type]": "AttributeFieldBlueprint",
            "query_term": "x",
            "field_name": "ignored",
            "attribute": {"name": "tag", "type": "string"}
        });
        let node = QueryNode::from_plan(Inspector::new(&doc));
        assert_eq!(node.class_name, "Attribute{string,lookup}");
        assert_eq!(node.field_name.as_deref(), Some("tag"));
    }

    #[test]
    fn field_name_without_attribute() {
        let doc = json!({"[type]": "DiskTermBlueprint", "field_name": "title", "query_term": "foo"});
        let node = QueryNode::from_plan(Inspector::new(&doc));
        assert_eq!(node.class_name, "DiskTerm");
        assert_eq!(node.label(), "DiskTerm[title] 'foo'");
    }

    #[rstest]
    #[case::legacy("/1/2/seek")]
    #[case::enumerated("[1,2]X::doSeek")]
    fn both_grammars_hit_the_same_node(#[case] name: &str) {
        let doc = plan();
        let mut tree = QueryTree::extract(Inspector::new(&doc));
        let s = sample(name);
        assert!(tree.apply(&Sample::new(Inspector::new(&s))));

        let target = &tree.root().children[1].children[2];
        assert_eq!(target.seeks, 3);
        assert_eq!(target.total_time_ms, 11.0);
        assert_eq!(target.self_time_ms, 3.0);
    }

    #[rstest]
    #[case::empty_legacy_path("/seek")]
    #[case::legacy_out_of_range("/1/7/seek")]
    #[case::legacy_too_deep("/0/0/seek")]
    #[case::empty_id_list("[]X::doSeek")]
    #[case::unknown_id("[2,42]X::doSeek")]
    #[case::unknown_method("[2]X::frobnicate")]
    #[case::garbage("rankingExpression(foo)")]
    fn unmatched_samples_change_nothing(#[case] name: &str) {
        let doc = plan();
        let mut tree = QueryTree::extract(Inspector::new(&doc));
        let before = format!("{:?}", tree.root());
        let s = sample(name);
        assert!(!tree.apply(&Sample::new(Inspector::new(&s))));
        assert_eq!(format!("{:?}", tree.root()), before);
    }

    #[test]
    fn enumerated_samples_apply_to_every_id() {
        let doc = plan();
        let mut tree = QueryTree::extract(Inspector::new(&doc));
        let s = json!({"name": "[1,3]Foo::doUnpack", "count": 2, "total_time_ms": 4.0, "self_time_ms": 1.5});
        assert!(tree.apply(&Sample::new(Inspector::new(&s))));
        for id in [1, 3] {
            let node = tree.node_by_id(id).expect("indexed");
            assert_eq!(node.seeks, 0);
            assert_eq!(node.total_time_ms, 4.0);
            assert_eq!(node.self_time_ms, 1.5);
        }
    }

    #[test]
    fn repeated_ids_count_once() {
        let doc = plan();
        let mut tree = QueryTree::extract(Inspector::new(&doc));
        let s = json!({"name": "[3,3]Foo::doSeek", "count": 2, "total_time_ms": 4.0, "self_time_ms": 1.5});
        assert!(tree.apply(&Sample::new(Inspector::new(&s))));
        let node = tree.node_by_id(3).expect("indexed");
        assert_eq!(node.seeks, 2);
        assert_eq!(node.total_time_ms, 4.0);
        assert_eq!(node.self_time_ms, 1.5);
    }

    #[test]
    fn flat_samples_only_touch_count_and_self_time() {
        let doc = plan();
        let mut tree = QueryTree::extract(Inspector::new(&doc));
        let s = json!({"name": "[0]And::doSeek", "count": 7, "self_time_ms": 0.25});
        assert!(tree.apply(&Sample::new(Inspector::new(&s))));
        assert!(tree.apply(&Sample::new(Inspector::new(&s))));
        let root = tree.root();
        assert_eq!(root.seeks, 14);
        assert_eq!(root.self_time_ms, 0.5);
        assert_eq!(root.total_time_ms, 0.0);
    }

    #[test]
    fn perf_table_draws_tree() {
        let doc = plan();
        let tree = QueryTree::extract(Inspector::new(&doc));
        let lines = crate::render::cell::render(&Cell::from(tree.perf_table()));
        let tree_column: Vec<&str> = lines
            .iter()
            .filter(|l| l.contains(" │ "))
            .filter_map(|l| l.rsplit(" │ ").next())
            .map(|c| c.trim_end_matches([' ', '│']))
            .collect();
        assert_eq!(
            tree_column,
            vec![
                "query tree",
                "And",
                "├── SourceBlender",
                "└── Or",
                "    ├── Empty",
                "    ├── Empty",
                "    └── Attribute{int32,fs}[year] '2020'",
            ]
        );
    }

    #[test]
    fn nearest_neighbor_details() {
        let doc = json!({
            "[type]": "search::queryeval::AndBlueprint",
            "children": {
                "[0]": {
                    "[type]": "search::queryeval::NearestNeighborBlueprint",
                    "[id]": 7,
                    "attribute_tensor": "tensor<float>(x[128])",
                    "query_tensor": "tensor<float>(x[128])",
                    "target_hits": 10,
                    "adjusted_target_hits": 20,
                    "explore_additional_hits": 100,
                    "algorithm": "index top k",
                    "global_filter": {"calculated": true, "hit_ratio": 0.25},
                    "top_k_hits": 20
                }
            }
        });
        let found = NearestNeighbor::find_all(Inspector::new(&doc));
        assert_eq!(found.len(), 1);
        let nn = &found[0];
        assert_eq!(nn.id, 7);
        assert_eq!(nn.adjusted_target_hits, 20);
        assert_eq!(nn.algorithm, "index top k");
        assert!(nn.global_filter_calculated);
        assert_eq!(nn.global_filter_hit_ratio, 0.25);
        assert!(!nn.table(12).is_empty());
    }
}
