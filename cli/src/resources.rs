use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::GalasaError;
use crate::http_client::CommsClient;
use crate::run_types::ResourceError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceAction {
    Apply,
    Create,
    Update,
    Delete,
}

impl ResourceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub async fn run_resources_action<C: CommsClient>(
    comms: &C,
    action: ResourceAction,
    file: &Path,
) -> Result<()> {
    info!(action = action.as_str(), ?file, "Galasa CLI resources command");
    let documents = load_resource_documents(file)?;
    let count = documents.len();
    apply_resources(comms, action, documents).await?;
    println!("{} resource(s) sent to {} ({})", count, comms.api_server_url(), action.as_str());
    Ok(())
}

/// Reads every YAML (or JSON) document in the file; blank documents are skipped.
pub fn load_resource_documents(file: &Path) -> Result<Vec<serde_json::Value>, GalasaError> {
    let content = fs::read_to_string(file).map_err(|e| GalasaError::ResourceFileRead {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = serde_json::Value::deserialize(document).map_err(|e| {
            GalasaError::ResourceFileParse {
                path: file.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        if !value.is_null() {
            documents.push(value);
        }
    }

    if documents.is_empty() {
        return Err(GalasaError::ResourceFileEmpty {
            path: file.to_path_buf(),
        });
    }
    Ok(documents)
}

pub async fn apply_resources<C: CommsClient>(
    comms: &C,
    action: ResourceAction,
    documents: Vec<serde_json::Value>,
) -> Result<(), GalasaError> {
    let payload = serde_json::json!({
        "action": action.as_str(),
        "data": documents,
    });

    comms
        .run_authenticated_command_with_rate_limit_retries(|api| {
            let payload = payload.clone();
            async move {
                api.post_resources(&payload).await.map(|_| ()).map_err(|e| {
                    GalasaError::ResourcesActionFailed {
                        action: action.as_str().to_string(),
                        status: e.status_code(),
                        reason: e
                            .body
                            .as_deref()
                            .map(server_error_messages)
                            .unwrap_or(e.message),
                    }
                })
            }
        })
        .await
}

/// Joins the messages of a server error list, or returns the body unchanged.
fn server_error_messages(body: &str) -> String {
    match serde_json::from_str::<Vec<ResourceError>>(body) {
        Ok(errors) if !errors.is_empty() => errors
            .into_iter()
            .filter_map(|e| e.error_message)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::GalasaCommsClient;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn comms(base_url: &str) -> GalasaCommsClient {
        GalasaCommsClient::new(base_url, Some("tok".to_string()), Duration::from_secs(5), 0)
            .expect("comms")
    }

    const TWO_PROPERTIES: &str = "\
apiVersion: galasa-dev/v1alpha1
kind: GalasaProperty
metadata:
  namespace: framework
  name: a
data:
  value: one
---
---
apiVersion: galasa-dev/v1alpha1
kind: GalasaProperty
metadata:
  namespace: framework
  name: b
data:
  value: two
";

    #[test]
    fn multi_document_yaml_skips_blank_documents() {
        let tmp = tempdir().expect("tempdir");
        let f = tmp.path().join("props.yaml");
        fs::write(&f, TWO_PROPERTIES).expect("write");

        let docs = load_resource_documents(&f).expect("docs");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["metadata"]["name"], "b");
    }

    #[test]
    fn json_files_are_accepted() {
        let tmp = tempdir().expect("tempdir");
        let f = tmp.path().join("prop.json");
        fs::write(&f, r#"{"kind": "GalasaProperty", "data": {"value": "x"}}"#).expect("write");
        let docs = load_resource_documents(&f).expect("docs");
        assert_eq!(docs[0]["kind"], "GalasaProperty");
    }

    #[test]
    fn missing_and_empty_files_are_distinct_errors() {
        let tmp = tempdir().expect("tempdir");
        let missing = tmp.path().join("nope.yaml");
        assert!(matches!(
            load_resource_documents(&missing),
            Err(GalasaError::ResourceFileRead { .. })
        ));

        let empty = tmp.path().join("empty.yaml");
        fs::write(&empty, "---\n").expect("write");
        assert!(matches!(
            load_resource_documents(&empty),
            Err(GalasaError::ResourceFileEmpty { .. })
        ));

        let broken = tmp.path().join("broken.yaml");
        fs::write(&broken, "kind: [unclosed\n").expect("write");
        assert!(matches!(
            load_resource_documents(&broken),
            Err(GalasaError::ResourceFileParse { .. })
        ));
    }

    #[tokio::test]
    async fn posts_action_and_documents() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/resources/")
                    .header("authorization", "Bearer tok")
                    .json_body(serde_json::json!({
                        "action": "apply",
                        "data": [{"kind": "GalasaProperty"}]
                    }));
                then.status(200);
            })
            .await;

        apply_resources(
            &comms(&server.base_url()),
            ResourceAction::Apply,
            vec![serde_json::json!({"kind": "GalasaProperty"})],
        )
        .await
        .expect("applied");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_list_becomes_the_reason() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/resources/");
                then.status(400).json_body(serde_json::json!([
                    {"error_code": 5017, "error_message": "GAL5017E: property a already exists"},
                    {"error_code": 5017, "error_message": "GAL5017E: property b already exists"}
                ]));
            })
            .await;

        let err = apply_resources(
            &comms(&server.base_url()),
            ResourceAction::Create,
            vec![serde_json::json!({"kind": "GalasaProperty"})],
        )
        .await
        .expect_err("400");

        match err {
            GalasaError::ResourcesActionFailed {
                action,
                status,
                reason,
            } => {
                assert_eq!(action, "create");
                assert_eq!(status, 400);
                assert_eq!(
                    reason,
                    "GAL5017E: property a already exists\nGAL5017E: property b already exists"
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
