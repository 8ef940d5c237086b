//! Property-based tests for plan construction
//!
//! Property: identical trees and contexts always produce identical plans, and
//! a pruned subtree contributes nothing to the plan.

use proptest::prelude::*;
use scaffold_engine::{
    Condition, Operation, PlanBuilder, ScaffoldTree, TemplateNode, Value,
    ValueKind, VariableContext, VariableSchema,
};

/// Strategy for generating file names
fn file_name_strategy() -> impl Strategy<Value = String> {
    r"[a-z]{1,8}\.(rs|md|toml)".prop_map(|s| s.to_string())
}

/// Strategy for generating project names
fn project_name_strategy() -> impl Strategy<Value = String> {
    r"[a-z][a-z0-9_-]{0,15}".prop_map(|s| s.to_string())
}

fn schema() -> VariableSchema {
    VariableSchema::new()
        .declare("project_name", ValueKind::String)
        .declare("with_docs", ValueKind::Bool)
}

fn context(project_name: &str, with_docs: bool) -> VariableContext {
    VariableContext::new()
        .push_layer(
            "test",
            vec![
                ("project_name".to_string(), Value::from(project_name)),
                ("with_docs".to_string(), Value::Bool(with_docs)),
            ],
        )
        .unwrap()
}

fn tree(files: &[String]) -> ScaffoldTree {
    let sources = files
        .iter()
        .map(|name| TemplateNode::template_file(name.clone(), "// {{ project_name | snake }}\n"))
        .collect();
    let docs = TemplateNode::directory(
        "docs",
        vec![TemplateNode::template_file("index.md", "# {{ project_name | title }}\n")],
    )
    .with_condition(Condition::parse("with_docs").unwrap());

    ScaffoldTree::new(
        TemplateNode::directory(
            "{{ project_name }}",
            vec![TemplateNode::directory("src", sources), docs],
        ),
        schema(),
    )
    .unwrap()
}

fn unique_files() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(file_name_strategy(), 1..6).prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// Property: building twice yields the same plan
    #[test]
    fn prop_plan_is_deterministic(
        files in unique_files(),
        project_name in project_name_strategy(),
        with_docs in any::<bool>(),
    ) {
        let tree = tree(&files);
        let ctx = context(&project_name, with_docs);

        let first = PlanBuilder::new().build(&tree, &ctx).unwrap();
        let second = PlanBuilder::new().build(&tree, &ctx).unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: pruned subtrees never appear in the plan
    #[test]
    fn prop_pruned_subtree_absent(
        files in unique_files(),
        project_name in project_name_strategy(),
    ) {
        let tree = tree(&files);
        let plan = PlanBuilder::new().build(&tree, &context(&project_name, false)).unwrap();

        prop_assert_eq!(plan.len(), 2 + files.len());
        let docs = std::path::Path::new(&project_name).join("docs");
        prop_assert!(plan.iter().all(|op| !op.path().starts_with(&docs)));
    }

    /// Property: directories precede their contents and paths are unique
    #[test]
    fn prop_directories_before_contents(
        files in unique_files(),
        project_name in project_name_strategy(),
        with_docs in any::<bool>(),
    ) {
        let plan = PlanBuilder::new()
            .build(&tree(&files), &context(&project_name, with_docs))
            .unwrap();

        let mut seen_dirs = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();
        for op in plan.iter() {
            prop_assert!(seen_paths.insert(op.path().to_path_buf()));
            if let Some(parent) = op.path().parent().filter(|p| !p.as_os_str().is_empty()) {
                prop_assert!(seen_dirs.contains(&parent.to_path_buf()), "parent of {:?} not planned first", op.path());
            }
            if let Operation::MkDir { path } = op {
                seen_dirs.push(path.clone());
            }
        }
    }
}
