//! End-to-end rendering against the shared snapshot fixture.

mod common;

use std::sync::Arc;

use common::{assert_eq, Fixture};
use lens_formatters::builtins::cfstring_summary_source;
use lens_formatters::synthetic::{cfstring_summary, CfStringProvider};
use lens_formatters::{
    AddCommand, DynamicMode, FormatKind, FormatRule, FormatterError, FormatterRegistry,
    FormatterResult, ProviderFactory, RenderMode, RenderOptions, RuleSpec, ScriptHandle,
    ScriptInterpreter, SummarySource, SyntheticProvider, Target, Truncation, TypeCommand,
    TypePattern, Value, ValueFormat, DEFAULT_CATEGORY,
};
use rstest::rstest;

fn add(registry: &FormatterRegistry, command: AddCommand) {
    TypeCommand::Add(command).execute(registry).unwrap();
}

fn template(text: &str, type_name: &str) -> AddCommand {
    AddCommand::new(RuleSpec::Template(text.to_string()), type_name)
}

// ══════════════════════════════════════════════════════════════════════════════
// Summaries and cascade
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_description_summary_replaces_field_dump() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(renderer.registry(), template("${var%@}", "MyClass"));

    let object = fixture.object.dereference(fixture.snapshot.as_ref()).unwrap();
    let out = renderer.render(&object, &RenderOptions::default());
    assert_eq!(out.summary.as_deref(), Some("<MyClass: 0x1000>"));
    assert_eq!(out.mode, RenderMode::Summary);
}

#[test]
fn test_non_cascading_summary_follows_pointer_not_subclass() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(renderer.registry(), template("a test", "MyClass").with_cascade(false));
    let options = RenderOptions::default().with_pointer_depth(1);

    let object = renderer.render(&fixture.object, &options);
    assert_eq!(object.summary.as_deref(), Some("a test"));
    assert_eq!(object.mode, RenderMode::Summary);
    assert_eq!(object.child("i").unwrap().value.as_deref(), Some("1"));

    let object2 = renderer.render(&fixture.object2, &options);
    assert_eq!(object2.summary, None);
    assert_eq!(object2.mode, RenderMode::Raw);
    assert_eq!(object2.child("MyClass").unwrap().summary.as_deref(), Some("a test"));
}

#[test]
fn test_skip_pointers_zero_stops_at_pointer() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(
        renderer.registry(),
        template("a test", "MyClass").with_cascade(false).with_skip_pointers(0),
    );

    let out = renderer.render(&fixture.object, &RenderOptions::default());
    assert_eq!(out.summary, None);
}

#[test]
fn test_non_cascading_summary_reaches_base_subobject_only() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(renderer.registry(), template("a test", "MyClass").with_cascade(false));

    let object2 = fixture.object2.dereference(fixture.snapshot.as_ref()).unwrap();
    let out = renderer.render(&object2, &RenderOptions::default());
    assert_eq!(out.summary, None);
    assert_eq!(out.child("MyClass").unwrap().summary.as_deref(), Some("a test"));
    assert_eq!(out.child("backup").unwrap().value.as_deref(), Some("3"));
}

#[test]
fn test_cascading_summary_applies_to_subclass_pointer() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(renderer.registry(), template("i=${var.MyClass.i}", "MyOtherClass"));
    add(renderer.registry(), template("class ${var%T}", "MyClass"));

    let out = renderer.render(&fixture.object2, &RenderOptions::default());
    // Own name beats the superclass
    assert_eq!(out.summary.as_deref(), Some("i=2"));

    renderer
        .registry()
        .delete_rule(DEFAULT_CATEGORY, FormatKind::Summary, "MyOtherClass")
        .unwrap();
    let out = renderer.render(&fixture.object2, &RenderOptions::default());
    assert_eq!(out.summary.as_deref(), Some("class MyOtherClass *"));
}

#[test]
fn test_format_rule_through_pointer_hops() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(
        renderer.registry(),
        AddCommand::new(RuleSpec::Format(ValueFormat::Hex), "int"),
    );

    let out = renderer.render(&fixture.object2, &RenderOptions::default().with_pointer_depth(1));
    assert_eq!(out.child("backup").unwrap().value.as_deref(), Some("0x00000003"));
    assert_eq!(
        out.descendant(&["MyClass", "i"]).unwrap().value.as_deref(),
        Some("0x00000002")
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings: built-in summary and synthetic children
// ══════════════════════════════════════════════════════════════════════════════

#[rstest]
#[case::inline(0, "@\"Hello\"")]
#[case::out_of_line(1, "@\"abc\"")]
#[case::pascal(2, "@\"hi\"")]
#[case::unicode(3, "@\"ok\"")]
fn test_builtin_string_summary(#[case] which: usize, #[case] expected: &str) {
    let fixture = Fixture::new();
    let value = [
        &fixture.str_inline,
        &fixture.str_mutable,
        &fixture.str_pascal,
        &fixture.str_unicode,
    ][which];
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(value, &RenderOptions::default());
    assert_eq!(out.summary.as_deref(), Some(expected));
}

fn add_string_synth(registry: &FormatterRegistry) {
    add(
        registry,
        AddCommand::new(RuleSpec::Synthetic(CfStringProvider::factory()), "NSString"),
    );
}

#[test]
fn test_string_synthetic_children() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add_string_synth(renderer.registry());

    let out = renderer.render(&fixture.str_mutable, &RenderOptions::default());
    assert_eq!(out.mode, RenderMode::Synthetic);
    // The provider suppresses the built-in summary
    assert_eq!(out.summary, None);
    assert_eq!(
        out.to_string(),
        "(NSString *) str_mutable = 0x0000000000002100 {\n  \
         (int) mutable = 1\n  \
         (int) inline = 0\n  \
         (int) explicit = 1\n  \
         (char [3]) content = \"abc\"\n\
         }"
    );
}

#[test]
fn test_synthetic_child_by_name() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add_string_synth(renderer.registry());
    let options = RenderOptions::default();

    let child = renderer
        .child_named(&fixture.str_inline, "mutable", &options)
        .unwrap();
    assert_eq!(child.expression_path(), "str_inline->mutable");

    let out = renderer
        .render_child_named(&fixture.str_inline, "mutable", &options)
        .unwrap();
    assert_eq!(out.to_string(), "(int) mutable = 0");

    assert!(renderer
        .child_named(&fixture.str_inline, "length", &options)
        .is_err());
}

#[test]
fn test_delete_synth_then_add_summary() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    let registry = renderer.registry();
    add_string_synth(registry);
    let options = RenderOptions::default();

    let before = renderer.render(&fixture.str_mutable, &options);
    assert_eq!(before.mode, RenderMode::Synthetic);
    assert_eq!(before.children.len(), 4);

    TypeCommand::Delete {
        kind: FormatKind::Synthetic,
        type_name: "NSString".to_string(),
        category: None,
    }
    .execute(registry)
    .unwrap();
    add(
        registry,
        AddCommand::new(RuleSpec::Summary(cfstring_summary_source()), "NSString"),
    );

    let after = renderer.render(&fixture.str_mutable, &options);
    assert_eq!(after.mode, RenderMode::Summary);
    assert!(after.children.is_empty());
    assert_eq!(after.to_string(), "(NSString *) str_mutable = 0x0000000000002100 @\"abc\"");
}

// ══════════════════════════════════════════════════════════════════════════════
// Scripted providers and summaries
// ══════════════════════════════════════════════════════════════════════════════

/// Interpreter exposing one provider class and one summary function
struct StringScripts;

impl ScriptInterpreter for StringScripts {
    fn create_synthetic(
        &self,
        class_name: &str,
        value: &Value,
    ) -> FormatterResult<Box<dyn SyntheticProvider>> {
        match class_name {
            "CFStringSynthProvider" => Ok(CfStringProvider::create(value)),
            other => Err(FormatterError::Script {
                name: other.to_string(),
                reason: "no such class".to_string(),
            }),
        }
    }

    fn call_summary(
        &self,
        function_name: &str,
        value: &Value,
        target: &dyn Target,
    ) -> FormatterResult<String> {
        match function_name {
            "CFString_SummaryProvider" => cfstring_summary(value, target),
            other => Err(FormatterError::Script {
                name: other.to_string(),
                reason: "exception raised".to_string(),
            }),
        }
    }
}

fn script(name: &str) -> ScriptHandle {
    ScriptHandle::new(name, Arc::new(StringScripts))
}

#[test]
fn test_scripted_provider_and_summary() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    let registry = renderer.registry();
    add(
        registry,
        AddCommand::new(
            RuleSpec::Synthetic(ProviderFactory::Scripted(script("CFStringSynthProvider"))),
            "NSString",
        ),
    );
    add(
        registry,
        AddCommand::new(
            RuleSpec::Summary(SummarySource::Script(script("CFString_SummaryProvider"))),
            "NSString",
        ),
    );

    let out = renderer.render(&fixture.str_inline, &RenderOptions::default());
    assert_eq!(out.mode, RenderMode::Synthetic);
    assert_eq!(out.summary, None);
    let names: Vec<&str> = out.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["mutable", "inline", "explicit", "content"]);
    assert_eq!(out.child("inline").unwrap().value.as_deref(), Some("1"));
    assert_eq!(out.child("content").unwrap().value.as_deref(), Some("\"Hello\""));

    let plain = renderer.render(
        &fixture.str_inline,
        &RenderOptions::default().with_synthetic(false),
    );
    assert_eq!(plain.mode, RenderMode::Summary);
    assert_eq!(plain.summary.as_deref(), Some("@\"Hello\""));
}

#[test]
fn test_failing_script_summary_renders_without_summary() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    add(
        renderer.registry(),
        AddCommand::new(
            RuleSpec::Summary(SummarySource::Script(script("Broken_SummaryProvider"))),
            "MyClass",
        ),
    );

    let out = renderer.render(&fixture.object, &RenderOptions::default().with_pointer_depth(1));
    assert_eq!(out.summary, None);
    assert_eq!(out.mode, RenderMode::Raw);
    assert_eq!(out.child("i").unwrap().value.as_deref(), Some("1"));
}

#[test]
fn test_missing_script_provider_falls_back_to_layout() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add(
        renderer.registry(),
        AddCommand::new(
            RuleSpec::Synthetic(ProviderFactory::Scripted(script("MissingProvider"))),
            "std::__1::vector<int>",
        ),
    );

    let out = renderer.render(&fixture.numbers, &RenderOptions::default());
    assert_eq!(out.mode, RenderMode::Raw);
    let names: Vec<&str> = out.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["__begin_", "__end_", "__end_cap_"]);
    assert_eq!(renderer.providers().stats().discarded, 1);
    assert!(renderer.providers().is_empty());
}

#[test]
fn test_synthetic_off_falls_back_to_summary() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add_string_synth(renderer.registry());

    let out = renderer.render(
        &fixture.str_pascal,
        &RenderOptions::default().with_synthetic(false),
    );
    assert_eq!(out.mode, RenderMode::Summary);
    assert_eq!(out.summary.as_deref(), Some("@\"hi\""));
}

// ══════════════════════════════════════════════════════════════════════════════
// Dynamic types
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_run_target_shows_dynamic_type() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let options = RenderOptions::default().with_dynamic(DynamicMode::RunTarget);

    let tagged = renderer.render(&fixture.dyn_test, &options.with_dynamic_type_shown(true));
    assert_eq!(
        tagged.to_string(),
        "(id, dynamic type: __NSCFString *) dyn_test = 0x0000000000002000 @\"Hello\""
    );

    let plain = renderer.render(&fixture.dyn_test, &options);
    assert!(plain.to_string().starts_with("(__NSCFString *) dyn_test"));
}

#[test]
fn test_current_frame_cannot_resolve_lazy_class() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(
        &fixture.dyn_test,
        &RenderOptions::default().with_dynamic(DynamicMode::CurrentFrame),
    );
    assert_eq!(out.dynamic_type, None);
    // `id` still reaches the string summary through its pointee
    assert_eq!(out.summary.as_deref(), Some("@\"Hello\""));
}

#[test]
fn test_dynamic_equal_to_static_is_not_tagged() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(
        &fixture.object2,
        &RenderOptions::default().with_dynamic(DynamicMode::RunTarget),
    );
    assert_eq!(out.dynamic_type, None);
    assert_eq!(out.type_label(), "MyOtherClass *");
}

// ══════════════════════════════════════════════════════════════════════════════
// Raw mode, idempotence, cycles, depth
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_raw_bypasses_everything() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add(renderer.registry(), AddCommand::new(RuleSpec::Format(ValueFormat::Hex), "int"));
    let options = RenderOptions::default()
        .with_raw(true)
        .with_dynamic(DynamicMode::RunTarget);

    let vector = renderer.render(&fixture.numbers, &options);
    assert_eq!(vector.mode, RenderMode::Raw);
    let names: Vec<&str> = vector.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["__begin_", "__end_", "__end_cap_"]);

    let string = renderer.render(&fixture.dyn_test, &options);
    assert_eq!(string.dynamic_type, None);
    assert_eq!(string.summary, None);
}

#[test]
fn test_vector_children() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(&fixture.numbers, &RenderOptions::default());
    assert_eq!(
        out.to_string(),
        "(std::__1::vector<int>) numbers = {\n  (int) [0] = 10\n  (int) [1] = 20\n  (int) [2] = 30\n}"
    );
    let second = renderer
        .child_named(&fixture.numbers, "[1]", &RenderOptions::default())
        .unwrap();
    assert_eq!(second.expression_path(), "numbers[1]");
}

#[test]
fn test_render_is_idempotent() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add_string_synth(renderer.registry());
    let options = RenderOptions::default().with_pointer_depth(2);

    for value in [&fixture.str_inline, &fixture.numbers, &fixture.object2, &fixture.head] {
        let first = renderer.render(value, &options);
        let second = renderer.render(value, &options);
        assert_eq!(first, second);
    }
    assert!(renderer.providers().stats().hits > 0);
}

#[test]
fn test_cycle_is_marked() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    let out = renderer.render(&fixture.head, &RenderOptions::default().with_pointer_depth(8));

    let inner = out.descendant(&["next", "next"]).unwrap();
    assert_eq!(inner.truncation, Some(Truncation::Cycle));
    assert!(inner.children.is_empty());
    assert_eq!(
        out.to_string(),
        "(Node) head = {\n  \
         (int) value = 1\n  \
         (Node *) next = 0x0000000000003010 {\n    \
         (int) value = 2\n    \
         (Node *) next = 0x0000000000003000 <cycle>\n  \
         }\n\
         }"
    );
}

#[test]
fn test_depth_limit_is_marked() {
    let fixture = Fixture::new();
    let renderer = fixture.renderer(Arc::new(FormatterRegistry::new()));
    let out = renderer.render(
        &fixture.head,
        &RenderOptions::default().with_pointer_depth(8).with_max_depth(1),
    );
    let next = out.child("next").unwrap();
    assert_eq!(next.truncation, Some(Truncation::Depth));
    assert!(out.is_truncated());
}

// ══════════════════════════════════════════════════════════════════════════════
// Process-state transitions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_new_stop_refreshes_provider() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let options = RenderOptions::default();
    assert_eq!(renderer.render(&fixture.numbers, &options).children.len(), 3);

    fixture.snapshot.write_u64(0x4008, 0x4108);
    fixture.snapshot.resume_and_stop();
    assert_eq!(renderer.render(&fixture.numbers, &options).children.len(), 2);
}

#[test]
fn test_process_state_changed_invalidates() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let options = RenderOptions::default();
    assert_eq!(renderer.render(&fixture.numbers, &options).children.len(), 3);

    // Same stop id: the stale provider is reused until told otherwise
    fixture.snapshot.write_u64(0x4008, 0x4104);
    assert_eq!(renderer.render(&fixture.numbers, &options).children.len(), 3);

    renderer.process_state_changed();
    assert!(renderer.providers().is_empty());
    assert_eq!(renderer.render(&fixture.numbers, &options).children.len(), 1);
    let stats = renderer.providers().stats();
    assert_eq!(stats.evicted, 1);
    assert_eq!(stats.misses, 2);
}

#[test]
fn test_state_change_releases_every_provider() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    add_string_synth(renderer.registry());
    let options = RenderOptions::default();
    for value in [
        &fixture.numbers,
        &fixture.str_inline,
        &fixture.str_mutable,
        &fixture.str_pascal,
        &fixture.str_unicode,
    ] {
        renderer.render(value, &options);
    }
    assert_eq!(renderer.providers().len(), 5);

    renderer.process_state_changed();
    assert!(renderer.providers().is_empty());

    // A rule change also drops providers built from the old rules
    renderer.render(&fixture.numbers, &options);
    assert_eq!(renderer.providers().len(), 1);
    TypeCommand::Delete {
        kind: FormatKind::Synthetic,
        type_name: "NSString".to_string(),
        category: None,
    }
    .execute(renderer.registry())
    .unwrap();
    renderer.render(&fixture.str_inline, &options);
    assert!(renderer.providers().is_empty());
}

#[test]
fn test_child_limit_elides_the_rest() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(&fixture.numbers, &RenderOptions::default().with_max_children(2));
    assert_eq!(out.children.len(), 2);
    assert_eq!(out.truncation, Some(Truncation::Children));
    assert_eq!(
        out.to_string(),
        "(std::__1::vector<int>) numbers = {\n  (int) [0] = 10\n  (int) [1] = 20\n  ...\n}"
    );

    let full = renderer.render(&fixture.numbers, &RenderOptions::default());
    assert_eq!(full.truncation, None);
}

#[test]
fn test_broken_vector_falls_back_to_layout() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    fixture.snapshot.write_u64(0x4008, 0x4102);
    fixture.snapshot.resume_and_stop();

    let out = renderer.render(&fixture.numbers, &RenderOptions::default());
    assert_eq!(out.mode, RenderMode::Raw);
    assert_eq!(out.children.len(), 3);
    assert!(renderer.providers().is_empty());
}

#[test]
fn test_disabled_category_stops_matching() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let registry = renderer.registry();
    registry.add_rule(
        DEFAULT_CATEGORY,
        FormatRule::format(TypePattern::exact("int"), ValueFormat::Hex),
    );
    TypeCommand::DisableCategory("system".to_string())
        .execute(registry)
        .unwrap();

    let out = renderer.render(&fixture.numbers, &RenderOptions::default());
    assert_eq!(out.mode, RenderMode::Raw);
    let string = renderer.render(&fixture.str_inline, &RenderOptions::default());
    assert_eq!(string.summary, None);
}

#[test]
fn test_json_output() {
    let fixture = Fixture::new();
    let renderer = fixture.builtin_renderer();
    let out = renderer.render(&fixture.numbers, &RenderOptions::default());
    let json: serde_json::Value = serde_json::from_str(&out.to_json().unwrap()).unwrap();
    assert_eq!(json["mode"], "synthetic");
    assert_eq!(json["children"][2]["value"], "30");
}
