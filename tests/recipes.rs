// tests/recipes.rs

//! Recipe discovery and dependency expansion over real directories.

mod common;

use common::{write_recipe, Workspace};
use kiln::recipe::BuildGraph;
use kiln::{DependencyWalker, Error, RecipeRegistry};

#[test]
fn test_builtin_and_custom_recipes() {
    let ws = Workspace::new();
    ws.add("zlib", &[]);
    ws.add("Openssl", &["zlib"]);
    let custom = ws.path().join("mine");
    write_recipe(&custom, "freetype", &common::simple_recipe("freetype", &["zlib"]));

    let mut registry = RecipeRegistry::new(vec![ws.recipes(), custom], ws.path().join("build"));
    assert_eq!(registry.list_available(), vec!["freetype", "Openssl", "zlib"]);

    let freetype = registry.get("freetype").unwrap();
    assert_eq!(freetype.build_dir, ws.path().join("build").join("freetype"));
    assert_eq!(freetype.description(), "recipe for freetype");
}

#[test]
fn test_hidden_and_broken_recipes_are_skipped() {
    let ws = Workspace::new();
    ws.add("zlib", &[]);
    write_recipe(&ws.recipes(), ".hidden", &common::simple_recipe("hidden", &[]));
    write_recipe(&ws.recipes(), "broken", "[package\nname=");

    let mut registry = RecipeRegistry::from_context(&ws.context());
    assert_eq!(registry.list_available(), vec!["broken", "zlib"]);
    assert!(registry.get("broken").is_none());
    assert_eq!(registry.load_all().len(), 1);
}

#[test]
fn test_version_override() {
    let ws = Workspace::new();
    write_recipe(
        &ws.recipes(),
        "hostpython",
        "[package]\nname = \"hostpython\"\n",
    );

    let mut registry = RecipeRegistry::from_context(&ws.context());
    let recipe = registry.get("hostpython==3.11.6").unwrap();
    assert_eq!(recipe.version(), Some("3.11.6"));
}

#[test]
fn test_expand_kivy_tree() {
    let ws = Workspace::new();
    ws.add("kivy", &["python", "sdl2_image", "freetype"]);
    ws.add("sdl2_image", &["sdl2"]);
    ws.add("sdl2", &[]);
    ws.add("freetype", &["zlib"]);
    ws.add("zlib", &[]);

    let ctx = ws.context();
    let mut registry = RecipeRegistry::from_context(&ctx);
    let walker = DependencyWalker::new(ctx.implicit_dependencies.iter().cloned());
    let nodes = walker.expand("kivy", &mut registry).unwrap();

    let levels: Vec<(&str, usize)> = nodes.iter().map(|n| (n.name.as_str(), n.level)).collect();
    assert_eq!(
        levels,
        vec![
            ("kivy", 0),
            ("python", 1),
            ("sdl2_image", 1),
            ("freetype", 1),
            ("sdl2", 2),
            ("zlib", 2),
        ]
    );
    assert!(nodes[1].implicit);

    let order = BuildGraph::from_nodes(&nodes).topological_sort().unwrap();
    assert_eq!(order, vec!["sdl2", "sdl2_image", "zlib", "freetype", "kivy"]);
}

#[test]
fn test_missing_dependency_names_referrer() {
    let ws = Workspace::new();
    ws.add("openssl", &["zlib"]);

    let mut registry = RecipeRegistry::from_context(&ws.context());
    let err = DependencyWalker::default()
        .expand("openssl", &mut registry)
        .unwrap_err();

    match err {
        Error::MissingDependency { name, referrers } => {
            assert_eq!(name, "zlib");
            assert_eq!(referrers, vec!["openssl".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cycle_is_reported() {
    let ws = Workspace::new();
    ws.add("a", &["b"]);
    ws.add("b", &["a"]);

    let mut registry = RecipeRegistry::from_context(&ws.context());
    let err = DependencyWalker::default().expand("a", &mut registry).unwrap_err();
    assert!(matches!(err, Error::CircularDependency { .. }));
    assert!(err.to_string().contains("a -> b -> a"));
}

#[test]
fn test_self_dependency_is_reported_as_cycle() {
    let ws = Workspace::new();
    ws.add("app", &["loop"]);
    ws.add("loop", &["loop"]);

    let mut registry = RecipeRegistry::from_context(&ws.context());
    assert!(registry.get("loop").is_some());

    let err = DependencyWalker::default().expand("app", &mut registry).unwrap_err();
    assert!(matches!(err, Error::CircularDependency { .. }));
    assert!(err.to_string().contains("loop -> loop"));
}
