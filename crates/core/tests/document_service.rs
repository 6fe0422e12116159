use std::sync::Arc;

use draftline_core::author::{AuthorRef, FixedAuthor};
use draftline_core::document::model::{HistoryStatus, NewHistoryVersion, NewVersion};
use draftline_core::document::validate::ValidationError;
use draftline_core::events::types::{DocumentEvent, EntryAction};
use draftline_core::mutation::types::{
    CreateParams, DeleteParams, FindManyParams, FindOneParams, LocaleParams, MetadataParams,
    UpdateParams,
};
use draftline_core::schema::{ContentTypeSchema, InMemorySchemaRegistry};
use draftline_core::store::memory::MemoryVersionStore;
use draftline_core::store::{HistoryQuery, VersionQuery, VersionStore};
use draftline_core::{DocumentError, DocumentService, Status};
use serde_json::{json, Map, Value};

const ARTICLE: &str = "api::article.article";
const SETTING: &str = "api::setting.setting";

fn article() -> ContentTypeSchema {
    serde_json::from_value(json!({
        "uid": ARTICLE,
        "info": { "singularName": "article", "pluralName": "articles" },
        "options": { "draftAndPublish": true },
        "pluginOptions": { "i18n": { "localized": true } },
        "attributes": {
            "title": { "type": "string", "required": true },
            "body": { "type": "richtext" },
            "slug": { "type": "uid", "pluginOptions": { "i18n": { "localized": false } } },
            "secret": { "type": "password" }
        }
    }))
    .unwrap()
}

fn setting() -> ContentTypeSchema {
    serde_json::from_value(json!({
        "uid": SETTING,
        "info": { "singularName": "setting" },
        "options": { "draftAndPublish": false },
        "attributes": {
            "name": { "type": "string" }
        }
    }))
    .unwrap()
}

struct Harness {
    service: DocumentService,
    store: Arc<MemoryVersionStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryVersionStore::new());
    let registry = InMemorySchemaRegistry::new()
        .with(article())
        .unwrap()
        .with(setting())
        .unwrap();
    let service = DocumentService::builder(store.clone(), Arc::new(registry))
        .author(Arc::new(FixedAuthor(AuthorRef::new("editor-1"))))
        .build();
    Harness { service, store }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn in_locale(locale: &str) -> LocaleParams {
    LocaleParams {
        locale: Some(locale.into()),
    }
}

impl Harness {
    async fn create(&self, locale: &str, value: Value) -> String {
        self.service
            .documents(ARTICLE)
            .create(CreateParams {
                locale: Some(locale.into()),
                data: data(value),
                ..Default::default()
            })
            .await
            .unwrap()
            .document_id
    }

    async fn history_count(&self, document_id: &str) -> usize {
        self.store
            .find_history(&HistoryQuery::new(ARTICLE, document_id))
            .await
            .unwrap()
            .len()
    }
}

#[tokio::test]
async fn update_of_published_version_always_fails() {
    let h = harness();
    let id = h.create("en", json!({ "title": "Hello" })).await;

    for target in [id.as_str(), "does-not-exist"] {
        let err = h
            .service
            .documents(ARTICLE)
            .update(
                target,
                UpdateParams {
                    locale: Some("en".into()),
                    status: Some(Status::Published),
                    data: data(json!({ "title": "Nope" })),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Validation(ValidationError::PublishedVersionUpdate)
        ));
    }
}

#[tokio::test]
async fn update_in_new_locale_creates_draft_and_keeps_original() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello", "slug": "hello" })).await;

    let fr = docs
        .update(
            &id,
            UpdateParams {
                locale: Some("fr".into()),
                data: data(json!({ "title": "Bonjour" })),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fr.status, Status::Draft);
    assert_eq!(fr.locale.as_deref(), Some("fr"));
    assert_eq!(fr.data["title"], "Bonjour");
    // Shared attributes come along to the new locale.
    assert_eq!(fr.data["slug"], "hello");

    let en = docs
        .find_one(
            &id,
            FindOneParams {
                locale: Some("en".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(en.data["title"], "Hello");

    let published_fr = docs
        .find_one(
            &id,
            FindOneParams {
                locale: Some("fr".into()),
                status: Some(Status::Published),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(published_fr.is_none());
}

#[tokio::test]
async fn update_of_unknown_document_returns_none() {
    let h = harness();
    let updated = h
        .service
        .documents(ARTICLE)
        .update(
            "nonexistent-id",
            UpdateParams {
                data: data(json!({ "title": "x" })),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.is_none());
    assert_eq!(h.history_count("nonexistent-id").await, 0);
}

#[tokio::test]
async fn publish_then_unpublish_keeps_draft_data() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello", "body": "text" })).await;
    let before = docs
        .find_one(&id, FindOneParams::default())
        .await
        .unwrap()
        .unwrap();

    let published = docs.publish(&id, in_locale("en")).await.unwrap().unwrap();
    assert_eq!(published.status, Status::Published);
    assert!(published.published_at.is_some());
    assert_eq!(published.data, before.data);

    let draft = docs.unpublish(&id, in_locale("en")).await.unwrap().unwrap();
    assert_eq!(draft.data, before.data);
    assert!(docs
        .find_one(
            &id,
            FindOneParams {
                status: Some(Status::Published),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn metadata_of_single_draft_is_empty() {
    let h = harness();
    let id = h.create("en", json!({ "title": "Hello" })).await;
    let meta = h
        .service
        .documents(ARTICLE)
        .get_metadata(
            &id,
            MetadataParams {
                locale: Some("en".into()),
                status: Some(Status::Draft),
            },
        )
        .await
        .unwrap();
    assert!(meta.available_locales.is_empty());
    assert!(meta.available_status.is_empty());
}

#[tokio::test]
async fn metadata_reports_siblings_and_other_status() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello" })).await;
    docs.create(CreateParams {
        document_id: Some(id.clone()),
        locale: Some("fr".into()),
        data: data(json!({ "title": "Bonjour" })),
        ..Default::default()
    })
    .await
    .unwrap();
    docs.publish(&id, in_locale("en")).await.unwrap().unwrap();

    let en = docs
        .get_metadata(
            &id,
            MetadataParams {
                locale: Some("en".into()),
                status: Some(Status::Draft),
            },
        )
        .await
        .unwrap();
    assert_eq!(en.available_status.len(), 1);
    assert!(en.available_status[0].published_at.is_some());
    let locales: Vec<_> = en
        .available_locales
        .iter()
        .map(|l| l.locale.as_deref())
        .collect();
    assert_eq!(locales, vec![Some("fr")]);

    let fr = docs
        .get_metadata(
            &id,
            MetadataParams {
                locale: Some("fr".into()),
                status: Some(Status::Draft),
            },
        )
        .await
        .unwrap();
    assert!(fr.available_status.is_empty());
}

#[tokio::test]
async fn each_mutation_appends_one_history_version() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "v1" })).await;
    assert_eq!(h.history_count(&id).await, 1);

    docs.update(
        &id,
        UpdateParams {
            data: data(json!({ "title": "v2" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(h.history_count(&id).await, 2);

    docs.publish(&id, in_locale("en")).await.unwrap();
    assert_eq!(h.history_count(&id).await, 3);

    // Unchanged republish writes nothing.
    docs.publish(&id, in_locale("en")).await.unwrap();
    assert_eq!(h.history_count(&id).await, 3);

    docs.update(
        &id,
        UpdateParams {
            data: data(json!({ "title": "v3" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let versions = h
        .service
        .history(ARTICLE)
        .find_versions(&id, Some("en"), None, 0)
        .await
        .unwrap();
    assert_eq!(versions.len(), 4);
    assert_eq!(versions[0].status, HistoryStatus::Modified);
    assert_eq!(versions[0].created_by, Some(AuthorRef::new("editor-1")));
    assert_eq!(versions[1].status, HistoryStatus::Published);
    assert_eq!(versions[3].status, HistoryStatus::Draft);
}

#[tokio::test]
async fn failed_mutation_leaves_nothing_behind() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let err = docs
        .create(CreateParams {
            document_id: Some("doc-1".into()),
            locale: Some("en".into()),
            status: Some(Status::Published),
            data: data(json!({ "body": "no title" })),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Validation(ValidationError::MissingRequired(_))
    ));

    assert!(docs
        .find_one("doc-1", FindOneParams::default())
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.history_count("doc-1").await, 0);
}

#[tokio::test]
async fn duplicate_locale_create_conflicts() {
    let h = harness();
    let id = h.create("en", json!({ "title": "Hello" })).await;
    let err = h
        .service
        .documents(ARTICLE)
        .create(CreateParams {
            document_id: Some(id),
            locale: Some("en".into()),
            data: data(json!({ "title": "Again" })),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::Conflict(_)));
}

#[tokio::test]
async fn discard_draft_resets_to_published() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Live" })).await;
    docs.publish(&id, in_locale("en")).await.unwrap();
    docs.update(
        &id,
        UpdateParams {
            data: data(json!({ "title": "Work in progress" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let draft = docs
        .discard_draft(&id, in_locale("en"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft.status, Status::Draft);
    assert_eq!(draft.data["title"], "Live");
}

#[tokio::test]
async fn delete_one_locale_or_all() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello" })).await;
    docs.update(
        &id,
        UpdateParams {
            locale: Some("fr".into()),
            data: data(json!({ "title": "Bonjour" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    docs.publish(&id, in_locale("en")).await.unwrap();

    let removed = docs
        .delete(
            &id,
            DeleteParams {
                locale: Some("fr".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(removed.deleted, 1);

    let removed = docs.delete(&id, DeleteParams::all_locales()).await.unwrap();
    assert_eq!(removed.deleted, 2);

    let again = docs.delete(&id, DeleteParams::all_locales()).await.unwrap();
    assert_eq!(again.deleted, 0);
}

#[tokio::test]
async fn restore_writes_snapshot_into_draft() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "First" })).await;
    docs.update(
        &id,
        UpdateParams {
            data: data(json!({ "title": "Second" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let history = h.service.history(ARTICLE);
    let versions = history.find_versions(&id, None, None, 0).await.unwrap();
    let first = versions.last().unwrap();
    assert_eq!(first.data["title"], "First");

    let mut events = h.service.events().subscribe();
    let restored = history.restore(first.id).await.unwrap().unwrap();
    assert_eq!(restored.status, Status::Draft);
    assert_eq!(restored.data["title"], "First");

    let mut actions = Vec::new();
    while let Ok(DocumentEvent::Entry(event)) = events.try_recv() {
        actions.push(event.event);
    }
    assert_eq!(actions, vec![EntryAction::Update, EntryAction::HistoryRestore]);

    assert!(history.restore(9_999).await.unwrap().is_none());
}

#[tokio::test]
async fn restore_of_unlocalized_snapshot_lands_in_default_locale() {
    let h = harness();
    let id = h.create("en", json!({ "title": "Current" })).await;

    // Snapshot written before the type was localized.
    let mut tx = h.store.begin().await.unwrap();
    let legacy = tx
        .record_history(NewHistoryVersion {
            content_type: ARTICLE.into(),
            related_document_id: id.clone(),
            locale: None,
            status: HistoryStatus::Draft,
            data: json!({ "title": "Legacy" }),
            schema: json!({}),
            created_by: None,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let restored = h
        .service
        .history(ARTICLE)
        .restore(legacy.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.locale.as_deref(), Some("en"));
    assert_eq!(restored.data["title"], "Legacy");

    let rows = h
        .store
        .find(ARTICLE, &VersionQuery::document(id.as_str()))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn shared_attributes_follow_across_locales() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello", "slug": "hello" })).await;
    docs.update(
        &id,
        UpdateParams {
            locale: Some("fr".into()),
            data: data(json!({ "title": "Bonjour" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let before = h.history_count(&id).await;

    let mut events = h.service.events().subscribe();
    docs.update(
        &id,
        UpdateParams {
            locale: Some("en".into()),
            data: data(json!({ "slug": "hello-2" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let fr = docs
        .find_one(
            &id,
            FindOneParams {
                locale: Some("fr".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fr.data["slug"], "hello-2");
    assert_eq!(fr.data["title"], "Bonjour");
    assert_eq!(h.history_count(&id).await, before + 2);

    let mut locales = Vec::new();
    while let Ok(DocumentEvent::Entry(event)) = events.try_recv() {
        assert_eq!(event.event, EntryAction::Update);
        locales.push(event.locale);
    }
    assert_eq!(locales, vec![Some("en".to_string()), Some("fr".to_string())]);

    // Localized attributes stay put.
    docs.update(
        &id,
        UpdateParams {
            locale: Some("en".into()),
            data: data(json!({ "title": "Hello again" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let fr = docs
        .find_one(
            &id,
            FindOneParams {
                locale: Some("fr".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fr.data["title"], "Bonjour");
}

#[tokio::test]
async fn unpublish_of_published_only_recreates_draft() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);

    let mut tx = h.store.begin().await.unwrap();
    tx.create(
        ARTICLE,
        NewVersion {
            document_id: "doc-live".into(),
            locale: Some("en".into()),
            status: Status::Published,
            data: data(json!({ "title": "Live only" })),
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let draft = docs
        .unpublish("doc-live", in_locale("en"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft.status, Status::Draft);
    assert_eq!(draft.data["title"], "Live only");

    let published = docs
        .find_one(
            "doc-live",
            FindOneParams {
                locale: Some("en".into()),
                status: Some(Status::Published),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(published.is_none());
    assert_eq!(h.history_count("doc-live").await, 1);

    assert!(docs
        .unpublish("doc-live", in_locale("en"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn delete_snapshots_each_locale() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let id = h.create("en", json!({ "title": "Hello" })).await;
    docs.update(
        &id,
        UpdateParams {
            locale: Some("fr".into()),
            data: data(json!({ "title": "Bonjour" })),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let before = h.history_count(&id).await;

    docs.delete(&id, DeleteParams::all_locales()).await.unwrap();
    assert_eq!(h.history_count(&id).await, before + 2);

    let history = h.service.history(ARTICLE);
    for (locale, title) in [("en", "Hello"), ("fr", "Bonjour")] {
        let latest = history
            .find_versions(&id, Some(locale), Some(1), 0)
            .await
            .unwrap();
        assert_eq!(latest[0].data["title"], title);
    }
}

#[tokio::test]
async fn create_published_writes_both_rows() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let mut events = h.service.events().subscribe();

    let created = docs
        .create(CreateParams {
            locale: Some("en".into()),
            status: Some(Status::Published),
            data: data(json!({ "title": "Straight out" })),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.status, Status::Published);
    assert!(created.published_at.is_some());

    let draft = docs
        .find_one(&created.document_id, FindOneParams::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft.data, created.data);
    assert_eq!(h.history_count(&created.document_id).await, 1);

    let mut actions = Vec::new();
    while let Ok(DocumentEvent::Entry(event)) = events.try_recv() {
        actions.push(event.event);
    }
    assert_eq!(actions, vec![EntryAction::Create, EntryAction::Publish]);
}

#[tokio::test]
async fn passwords_are_hashed_on_input() {
    let h = harness();
    let id = h
        .create("en", json!({ "title": "Hello", "secret": "hunter2" }))
        .await;
    let row = h
        .service
        .documents(ARTICLE)
        .find_one(&id, FindOneParams::default())
        .await
        .unwrap()
        .unwrap();
    let stored = row.data["secret"].as_str().unwrap();
    assert_ne!(stored, "hunter2");
    assert!(draftline_core::sanitize::verify_password("hunter2", stored));
}

#[tokio::test]
async fn find_many_lists_one_status_and_locale() {
    let h = harness();
    let docs = h.service.documents(ARTICLE);
    let a = h.create("en", json!({ "title": "A" })).await;
    h.create("en", json!({ "title": "B" })).await;
    h.create("fr", json!({ "title": "C" })).await;
    docs.publish(&a, in_locale("en")).await.unwrap();

    let drafts = docs.find_many(FindManyParams::default()).await.unwrap();
    assert_eq!(drafts.len(), 2);

    let published = docs
        .find_many(FindManyParams {
            status: Some(Status::Published),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].document_id, a);
}

#[tokio::test]
async fn single_status_types_store_published_rows() {
    let h = harness();
    let settings = h.service.documents(SETTING);
    let row = settings
        .create(CreateParams {
            data: data(json!({ "name": "site" })),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(row.status, Status::Published);
    assert_eq!(row.locale, None);

    let updated = settings
        .update(
            &row.document_id,
            UpdateParams {
                data: data(json!({ "name": "renamed" })),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, row.id);
    assert_eq!(updated.data["name"], "renamed");

    let err = settings
        .publish(&row.document_id, LocaleParams::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Validation(ValidationError::DraftAndPublishDisabled(_))
    ));

    let err = settings
        .create(CreateParams {
            locale: Some("fr".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DocumentError::Validation(ValidationError::NotLocalized(_))
    ));
}

#[tokio::test]
async fn unknown_content_type_is_an_error() {
    let h = harness();
    let err = h
        .service
        .documents("api::missing.missing")
        .find_one("x", FindOneParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentError::UnknownContentType(_)));
}
