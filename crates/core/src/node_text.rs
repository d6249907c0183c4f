//! Text fields that older snapshots stored as serialized element trees.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Node {
    Text(String),
    Many(Vec<Node>),
    Element {
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        props: Props,
    },
    Other(IgnoredAny),
}

#[derive(Default, Deserialize)]
struct Props {
    #[serde(default)]
    children: Option<Box<Node>>,
}

impl Node {
    fn collect(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Many(nodes) => nodes.iter().for_each(|node| node.collect(out)),
            Node::Element { kind, props } => {
                let Some(children) = props.children.as_deref() else {
                    return;
                };
                if kind.as_deref() == Some("strong") {
                    out.push_str("<strong>");
                    children.collect(out);
                    out.push_str("</strong>");
                } else {
                    children.collect(out);
                }
            }
            Node::Other(_) => {}
        }
    }
}

/// Accepts a plain string or an element tree, keeping its text and `<strong>` runs.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let node = Node::deserialize(deserializer)?;
    let mut out = String::new();
    node.collect(&mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Field {
        #[serde(deserialize_with = "super::deserialize")]
        value: String,
    }

    fn read(json: &str) -> String {
        serde_json::from_str::<Field>(json).expect("field parses").value
    }

    #[test]
    fn plain_strings_pass_through() {
        assert_eq!(read(r#"{"value":"Audit requis."}"#), "Audit requis.");
    }

    #[test]
    fn element_trees_keep_text_and_strong() {
        let json = r#"{"value":{"type":"p","key":null,"props":{"className":"italic",
            "children":["Le ",{"type":"strong","props":{"children":"Sphinx"}}," tient."]},
            "_owner":null,"_store":{}}}"#;
        assert_eq!(read(json), "Le <strong>Sphinx</strong> tient.");
    }

    #[test]
    fn childless_or_scalar_nodes_read_as_empty() {
        assert_eq!(read(r#"{"value":{"type":"br","props":{}}}"#), "");
        assert_eq!(read(r#"{"value":42}"#), "");
    }
}
