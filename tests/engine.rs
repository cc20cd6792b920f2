use moban::builder::Stage;
use moban::cache::ArtifactCache;
use moban::engine::Engine;
use moban::error::TplError;
use moban::loader::{FileLoader, StringLoader};
use moban::node::Node;
use moban::visitor::{EnterAction, Scope, Visitor};
use serde_json::json;

fn string_engine(templates: &[(&str, &str)]) -> Engine {
    let mut loader = StringLoader::new();
    for (name, content) in templates {
        loader.set(*name, *content);
    }
    Engine::new(Box::new(loader))
}

#[test]
fn inject_default_and_binding() {
    let mut engine = string_engine(&[("hello", "Hello, ${name|Guest}!")]);
    assert_eq!(engine.render("hello", &json!({})).unwrap(), "Hello, Guest!");

    let mut engine = string_engine(&[("hello", "Hello, ${name|Guest}!")]);
    assert_eq!(
        engine.render("hello", &json!({"name": "Ann"})).unwrap(),
        "Hello, Ann!"
    );
}

#[test]
fn literal_template_round_trips_byte_exact() {
    let source = "hello world\n<div class=\"x\">y</div>\n尾行";
    let mut engine = string_engine(&[("plain", source)]);
    assert_eq!(engine.render("plain", &json!({})).unwrap(), source);
}

#[test]
fn echo_escapes_raw_does_not() {
    let mut engine = string_engine(&[("e", "{{ html }}"), ("r", "{!! html !!}")]);
    let data = json!({"html": "<b>"});
    assert_eq!(engine.render("e", &data).unwrap(), "&lt;b&gt;");
    assert_eq!(engine.render("r", &data).unwrap(), "<b>");
}

#[test]
fn directives_end_to_end() {
    let mut engine = string_engine(&[(
        "list",
        "@if(items)<ul>@for(item in items)<li>{{ item.name }}</li>@endfor</ul>@else empty@endif",
    )]);
    let out = engine
        .render(
            "list",
            &json!({"items": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap();
    assert_eq!(out, "<ul><li>a</li><li>b</li></ul>");

    let mut engine = string_engine(&[(
        "list",
        "@if(items)<ul>@for(item in items)<li>{{ item.name }}</li>@endfor</ul>@else empty@endif",
    )]);
    assert_eq!(engine.render("list", &json!({})).unwrap(), " empty");
}

#[test]
fn block_without_extends_renders_inline() {
    let mut engine = string_engine(&[("root", "<block:content>hello world</block:content>")]);
    assert_eq!(engine.render("root", &json!({})).unwrap(), "hello world");
}

#[test]
fn block_override_replaces_parent_content() {
    let mut engine = string_engine(&[
        ("root", "<extends:parent/><block:title>X</block:title>"),
        ("parent", "<b><block:title>Y</block:title></b>"),
    ]);
    let out = engine.render("root", &json!({})).unwrap();
    assert!(out.contains('X'), "{out}");
    assert!(!out.contains('Y'), "{out}");
    assert_eq!(out, "<b>X</b>");
}

#[test]
fn parent_marker_splices_original_content() {
    let mut engine = string_engine(&[
        (
            "root",
            "<extends:parent/><block:content>hello ${parent}</block:content>",
        ),
        (
            "parent",
            "<b><block:content>parent world</block:content></b>",
        ),
    ]);
    // 父内容恰好出现在标记位置
    assert_eq!(
        engine.render("root", &json!({})).unwrap(),
        "<b>hello parent world</b>"
    );
}

#[test]
fn extends_attribute_injected_at_compile_time() {
    let mut engine = string_engine(&[
        (
            "root",
            "<extends:parent value=\"x\"/><block:content>hi</block:content>",
        ),
        (
            "parent",
            "<b value=\"${value}\"><block:content>c</block:content></b>",
        ),
    ]);
    assert_eq!(
        engine.render("root", &json!({})).unwrap(),
        "<b value=\"x\">hi</b>"
    );
}

#[test]
fn multi_level_extends() {
    let mut engine = string_engine(&[
        ("root", "<extends:child/><block:data>root</block:data>"),
        (
            "child",
            "<extends:parent/><block:content><i><block:data/></i></block:content>",
        ),
        ("parent", "<b><block:content>c</block:content></b>"),
    ]);
    assert_eq!(
        engine.render("root", &json!({})).unwrap(),
        "<b><i>root</i></b>"
    );
}

#[test]
fn unmatched_child_block_collected_not_rendered() {
    let mut engine = string_engine(&[
        (
            "root",
            "<extends:parent/><block:title>T</block:title><block:scripts>S</block:scripts>",
        ),
        ("parent", "<b><block:title>t</block:title></b>"),
    ]);
    let out = engine.render("root", &json!({})).unwrap();
    assert_eq!(out, "<b>T</b>");
    assert!(!out.contains('S'), "游离块不得内联渲染：{out}");
}

#[test]
fn import_splices_referenced_template() {
    let mut engine = string_engine(&[("root", "X[<import:part/>]"), ("part", "yo")]);
    assert_eq!(engine.render("root", &json!({})).unwrap(), "X[yo]");
}

#[test]
fn import_cycle_fails_fast() {
    let mut engine = string_engine(&[("a", "<import:b/>"), ("b", "<import:a/>")]);
    let err = engine.render("a", &json!({})).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("循环"), "{text}");
}

#[test]
fn extends_cycle_fails_fast() {
    let mut engine = string_engine(&[("a", "<extends:a/><block:x>1</block:x>")]);
    let err = engine.render("a", &json!({})).unwrap_err();
    assert!(err.to_string().contains("循环"), "{err}");
}

#[test]
fn runtime_failure_maps_through_import_chain() {
    let mut engine = string_engine(&[
        ("a", "A\n<import:b/>"),
        ("b", "B1\n<import:c/>"),
        ("c", "{{ x | boom }}"),
    ]);
    let err = engine.render("a", &json!({"x": 1})).unwrap_err();
    let TplError::Render { frames, .. } = &err else {
        panic!("应为渲染错误：{err}");
    };
    let paths: Vec<&str> = frames.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["c", "b", "a"]);
    assert_eq!(frames[0].line, 1);
    assert_eq!(frames[1].line, 2);
    assert_eq!(frames[2].line, 2);
    // 展示时最外层是被渲染的根模板
    let text = err.to_string();
    assert!(text.contains("boom"), "{text}");
}

#[test]
fn unmatched_close_tag_is_structural_failure() {
    let mut engine = string_engine(&[("bad", "text</x>")]);
    let err = engine.render("bad", &json!({})).unwrap_err();
    assert!(matches!(err, TplError::Syntax { .. }), "{err}");
}

#[test]
fn unclosed_directive_is_compile_error() {
    let mut engine = string_engine(&[("bad", "@if(x) y")]);
    let err = engine.render("bad", &json!({})).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("未闭合"), "{text}");
}

#[test]
fn user_visitor_runs_in_registered_stage() {
    struct Shout;
    impl Visitor for Shout {
        fn enter_node(
            &mut self,
            node: &mut Node,
            _scope: &Scope,
        ) -> Result<EnterAction, TplError> {
            if let Node::Raw(raw) = node {
                raw.text = raw.text.to_uppercase();
            }
            Ok(EnterAction::Continue)
        }
    }

    let mut engine = string_engine(&[("t", "hello")]);
    engine
        .builder_mut()
        .add_visitor(Stage::Finalize, Box::new(|| Box::new(Shout)));
    assert_eq!(engine.render("t", &json!({})).unwrap(), "HELLO");
}

#[test]
fn check_reports_broken_templates() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("good.mb"), "<b>ok</b>").unwrap();
    std::fs::write(templates.join("broken.mb"), "<b><i></b>").unwrap();

    let config = moban::MobanConfig::default();
    let result = moban::check::run(dir.path(), &config).unwrap();
    assert_eq!(result.checked, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("broken"), "{:?}", result.errors);
}

mod disk_cache {
    use super::*;
    use std::fs;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        templates: std::path::PathBuf,
        cache_dir: std::path::PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let cache_dir = dir.path().join("cache");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("a.mb"), "X[<import:b/>]").unwrap();
        fs::write(templates.join("b.mb"), "yo").unwrap();
        Fixture {
            _dir: dir,
            templates,
            cache_dir,
        }
    }

    fn engine(fx: &Fixture) -> Engine {
        Engine::new(Box::new(FileLoader::new(&fx.templates)))
            .with_cache(ArtifactCache::new(&fx.cache_dir))
    }

    #[test]
    fn cold_then_warm_is_idempotent() {
        let fx = fixture();

        let mut first = engine(&fx);
        let content_cold = first.compile("a").unwrap();
        assert_eq!(first.render("a", &json!({})).unwrap(), "X[yo]");

        // 第二个引擎实例：注册表冷、缓存热
        let mut second = engine(&fx);
        let key = second.unit_key("a");
        let cache = ArtifactCache::new(&fx.cache_dir);
        assert!(cache.is_fresh(&key));
        let content_warm = second.compile("a").unwrap();
        assert_eq!(content_cold, content_warm);
        assert_eq!(second.render("a", &json!({})).unwrap(), "X[yo]");
    }

    #[test]
    fn touching_import_invalidates_dependent() {
        let fx = fixture();

        let mut e = engine(&fx);
        assert_eq!(e.render("a", &json!({})).unwrap(), "X[yo]");
        let key = e.unit_key("a");
        let cache = ArtifactCache::new(&fx.cache_dir);
        assert!(cache.is_fresh(&key));

        // 拉开 mtime 差距后改动被引入的模板
        std::thread::sleep(Duration::from_millis(1100));
        fs::write(fx.templates.join("b.mb"), "ya").unwrap();

        assert!(!cache.is_fresh(&key), "引入模板变更后必须判定过期");
        assert_eq!(e.render("a", &json!({})).unwrap(), "X[ya]");
    }

    #[test]
    fn reset_deletes_artifact_and_manifest() {
        let fx = fixture();

        let mut e = engine(&fx);
        e.render("a", &json!({})).unwrap();
        let key = e.unit_key("a");
        let cache = ArtifactCache::new(&fx.cache_dir);
        assert!(cache.is_fresh(&key));

        e.reset("a").unwrap();
        assert!(!cache.is_fresh(&key));
        // 失效后再取重新编译，结果不变
        assert_eq!(e.render("a", &json!({})).unwrap(), "X[yo]");
    }

    #[test]
    fn manifest_lists_all_consumed_paths() {
        let fx = fixture();

        let mut e = engine(&fx);
        e.render("a", &json!({})).unwrap();
        let cache = ArtifactCache::new(&fx.cache_dir);
        let (_, map) = cache.load(&e.unit_key("a")).unwrap();

        assert_eq!(map.manifest.len(), 2);
        let joined: Vec<&str> = map.manifest.iter().map(|m| m.path.as_str()).collect();
        assert!(joined.iter().any(|p| p.ends_with("a.mb")), "{joined:?}");
        assert!(joined.iter().any(|p| p.ends_with("b.mb")), "{joined:?}");
    }
}
