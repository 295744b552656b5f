//! Integration tests for dotprompt
//!
//! These tests drive full documents through compile and render.

use dotprompt::{
    BoxError, DataArgument, Dotprompt, DotpromptError, DotpromptOptions, JsonSchema, Message, PartialLoader, Part,
    PromptMetadata, RenderedPrompt, ToolDefinition,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn dotprompt() -> Dotprompt {
    Dotprompt::new(DotpromptOptions::default()).expect("Failed to create Dotprompt")
}

fn data(value: Value) -> DataArgument {
    serde_json::from_value(value).expect("Invalid data argument")
}

fn roles(rendered: &RenderedPrompt) -> Vec<&str> {
    rendered.messages.iter().map(|m| m.role.as_str()).collect()
}

fn text_of(message: &Message) -> String {
    message.content.iter().filter_map(Part::as_text).collect()
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn test_role_markers_produce_messages() {
    let rendered = dotprompt()
        .render(r#"{{role "model"}}Hi{{role "user"}}Bye"#, &DataArgument::default(), None)
        .unwrap();

    assert_eq!(roles(&rendered), vec!["model", "user"]);
    assert_eq!(text_of(&rendered.messages[0]), "Hi");
    assert_eq!(text_of(&rendered.messages[1]), "Bye");
}

#[test]
fn test_full_document_render() {
    let source = r#"---
model: gemini-pro
config:
  temperature: 0.2
input:
  schema:
    name: string
    style?(enum): [formal, casual]
output:
  format: json
  schema:
    greeting: string, the greeting
mymeta.owner: alice
---
{{role "system"}}
You greet people.
{{role "user"}}
Greet {{name}}{{#if style}} in a {{style}} style{{/if}}.
"#;

    let rendered = dotprompt()
        .render(source, &data(json!({"input": {"name": "Ada", "style": "formal"}})), None)
        .unwrap();

    assert_eq!(roles(&rendered), vec!["system", "user"]);
    assert_eq!(text_of(&rendered.messages[0]).trim(), "You greet people.");
    assert_eq!(text_of(&rendered.messages[1]).trim(), "Greet Ada in a formal style.");

    let meta = &rendered.metadata;
    assert_eq!(meta.model.as_deref(), Some("gemini-pro"));
    assert_eq!(meta.config.get("temperature"), Some(&json!(0.2)));
    assert_eq!(meta.ext["mymeta"].get("owner"), Some(&json!("alice")));
    assert_eq!(
        meta.input.schema,
        Some(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "style": {"enum": ["formal", "casual", null]}
            },
            "required": ["name"],
            "additionalProperties": false
        }))
    );
    assert_eq!(
        meta.output.schema.as_ref().unwrap()["properties"]["greeting"],
        json!({"type": "string", "description": "the greeting"})
    );
}

#[test]
fn test_rendered_prompt_json_shape() {
    let rendered = dotprompt()
        .render(
            "---\nmodel: m\n---\nLook {{media url=img}}",
            &data(json!({"input": {"img": "https://x.test/cat.png"}})),
            None,
        )
        .unwrap();

    let value = serde_json::to_value(&rendered).unwrap();
    assert_eq!(value["model"], json!("m"));
    assert_eq!(
        value["messages"],
        json!([{
            "role": "user",
            "content": [
                {"text": "Look "},
                {"media": {"url": "https://x.test/cat.png"}}
            ]
        }])
    );
}

#[test]
fn test_section_becomes_pending_part() {
    let rendered = dotprompt()
        .render(r#"Answer: {{section "output"}}"#, &DataArgument::default(), None)
        .unwrap();

    let content = &rendered.messages[0].content;
    assert_eq!(content.len(), 2);
    assert_eq!(content[1], Part::pending("output"));
}

#[test]
fn test_history_inserted_before_trailing_user_message() {
    let history = json!({
        "messages": [
            {"role": "user", "content": [{"text": "What is 2+2?"}]},
            {"role": "model", "content": [{"text": "4"}]}
        ]
    });
    let rendered = dotprompt()
        .render(
            r#"{{role "system"}}Be brief.{{role "user"}}And 3+3?"#,
            &data(history),
            None,
        )
        .unwrap();

    assert_eq!(roles(&rendered), vec!["system", "user", "model", "user"]);
    assert_eq!(text_of(&rendered.messages[1]), "What is 2+2?");
    assert_eq!(text_of(&rendered.messages[3]), "And 3+3?");
}

#[test]
fn test_history_marker_used_once() {
    let history = json!({"messages": [{"role": "user", "content": [{"text": "earlier"}]}]});
    let rendered = dotprompt()
        .render(r#"{{role "system"}}Sys{{history}}Now"#, &data(history), None)
        .unwrap();

    assert_eq!(roles(&rendered), vec!["system", "user", "model"]);
    assert!(rendered.messages[1].is_history());
    let earlier = rendered.messages.iter().filter(|m| text_of(m) == "earlier").count();
    assert_eq!(earlier, 1);
}

// =============================================================================
// Metadata resolution
// =============================================================================

#[test]
fn test_config_precedence_model_then_file_then_render() {
    let options = DotpromptOptions::default()
        .with_default_model("gemini-pro")
        .with_model_config("gemini-pro", json!({"temperature": 0.5}));
    let mut dp = Dotprompt::new(options).unwrap();

    let overrides = PromptMetadata {
        config: json!({"topK": 5}).as_object().cloned().unwrap(),
        ..Default::default()
    };
    let rendered = dp
        .render(
            "---\nconfig:\n  temperature: 0.7\n  topK: 3\n---\nHi",
            &DataArgument::default(),
            Some(&overrides),
        )
        .unwrap();

    assert_eq!(Value::Object(rendered.metadata.config), json!({"temperature": 0.7, "topK": 5}));
}

#[test]
fn test_tool_resolver_and_registry() {
    let clock = ToolDefinition {
        name: "clock".to_string(),
        description: Some("Current time".to_string()),
        input_schema: json!({"type": "object"}),
        output_schema: None,
    };
    let resolved = clock.clone();
    let options = DotpromptOptions::default().with_tool_resolver(
        move |name: &str| -> Result<Option<ToolDefinition>, BoxError> {
            Ok((name == "clock").then(|| resolved.clone()))
        },
    );
    let mut dp = Dotprompt::new(options).unwrap();

    let rendered = dp
        .render("---\ntools: [clock]\n---\nWhat time is it?", &DataArgument::default(), None)
        .unwrap();
    assert_eq!(rendered.metadata.tool_defs, vec![clock]);
    assert!(rendered.metadata.tools.is_empty());

    let err = dp
        .render("---\ntools: [teleport]\n---\nGo", &DataArgument::default(), None)
        .unwrap_err();
    assert!(matches!(err, DotpromptError::ToolNotFound { .. }));
    assert!(err.to_string().contains("teleport"));
}

#[test]
fn test_named_schema_reference() {
    let address: JsonSchema = json!({
        "type": "object",
        "properties": {"city": {"type": "string"}},
        "required": ["city"]
    })
    .as_object()
    .cloned()
    .unwrap();
    let mut dp = Dotprompt::new(DotpromptOptions::default().with_schema("Address", address.clone())).unwrap();

    let rendered = dp
        .render(
            "---\noutput:\n  schema:\n    home: Address, where they live\n---\nWhere?",
            &DataArgument::default(),
            None,
        )
        .unwrap();

    let home = &rendered.metadata.output.schema.unwrap()["properties"]["home"];
    assert_eq!(home["description"], json!("where they live"));
    assert_eq!(home["properties"]["city"], json!({"type": "string"}));
}

#[test]
fn test_unknown_schema_name_fails_render() {
    let err = dotprompt()
        .render("---\noutput:\n  schema: FooType\n---\nx", &DataArgument::default(), None)
        .unwrap_err();
    assert!(err.to_string().contains("FooType"));
}

// =============================================================================
// Partials
// =============================================================================

#[test]
fn test_partials_from_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(temp_dir.path().join("_header.prompt"), "Hello {{name}}. {{> signoff}}").unwrap();
    std::fs::write(temp_dir.path().join("signoff.prompt"), "Regards.").unwrap();

    let loader = PartialLoader::new([temp_dir.path()]);
    let mut dp = Dotprompt::new(DotpromptOptions::default().with_partial_resolver(loader)).unwrap();

    let rendered = dp
        .render("{{> header}}", &data(json!({"input": {"name": "Ada"}})), None)
        .unwrap();
    assert_eq!(text_of(&rendered.messages[0]), "Hello Ada. Regards.");
}

#[test]
fn test_partial_from_options() {
    let options = DotpromptOptions::default().with_partial("persona", r#"{{role "system"}}You are {{who}}."#);
    let mut dp = Dotprompt::new(options).unwrap();

    let rendered = dp
        .render(
            r#"{{> persona}}{{role "user"}}Hi"#,
            &data(json!({"input": {"who": "a pirate"}})),
            None,
        )
        .unwrap();
    assert_eq!(roles(&rendered), vec!["system", "user"]);
    assert_eq!(text_of(&rendered.messages[0]), "You are a pirate.");
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_parse_without_frontmatter() {
    let parsed = dotprompt().parse("  Just a template\t");
    assert_eq!(parsed.template, "Just a template");
    assert_eq!(parsed.metadata, PromptMetadata::default());
}

#[test]
fn test_malformed_frontmatter_still_renders() {
    let source = "---\nmodel: [oops\n---\nHello";
    let rendered = dotprompt().render(source, &DataArgument::default(), None).unwrap();
    assert!(rendered.metadata.model.is_none());
    assert!(text_of(&rendered.messages[0]).ends_with("Hello"));
}
