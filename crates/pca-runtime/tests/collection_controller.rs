use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use pca_core::error::{ErrorCategory, ErrorClassifier, RawError};
use pca_core::memory::{MemoryStore, derive_valor_total};
use pca_core::model::{Demanda, UnidadeGestora};
use pca_core::record::Document;
use pca_core::store::{RemoteStore, StoreOp};
use pca_core::value::Fields;
use pca_runtime::{CollectionController, InsertPosition, store_calls_total};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn unidade(id: &str, nome: &str, sigla: &str) -> UnidadeGestora {
    UnidadeGestora {
        id: id.into(),
        nome: nome.into(),
        sigla: sigla.into(),
        responsavel: String::new(),
        email: String::new(),
        created_at: None,
    }
}

fn quiet() -> ErrorClassifier {
    ErrorClassifier::new(false)
}

#[tokio::test]
async fn duplicate_create_is_a_validation_failure() {
    let store = Rc::new(
        MemoryStore::new("unidades")
            .unique("sigla")
            .with_rows([unidade("u1", "Secretaria de Administração", "SEAD")]),
    );
    let controller = CollectionController::open(Rc::clone(&store), quiet()).await;
    let before = controller.items();

    let err = controller
        .create(fields(json!({ "nome": "Outra", "sigla": "SEAD" })))
        .await
        .unwrap_err();

    assert_eq!(err.category, ErrorCategory::Validation);
    assert_eq!(
        err.message,
        "Já existe um registro com estes dados. Por favor, verifique se não está duplicado."
    );
    assert_eq!(controller.items(), before);
    assert_eq!(controller.error(), None);
    assert!(!controller.loading());
}

#[tokio::test]
async fn created_demand_comes_back_computed_and_first() {
    let store = Rc::new(MemoryStore::<Demanda>::new("demandas").derive(derive_valor_total));
    let controller = CollectionController::open(Rc::clone(&store), quiet()).await;

    controller
        .create(fields(json!({
            "unidade_id": "u1", "item": "Cadeira", "quantidade": 2, "valor_unitario": 300
        })))
        .await
        .unwrap();
    let created = controller
        .create(fields(json!({
            "unidade_id": "u1", "item": "Notebook", "quantidade": 3, "valor_unitario": 4500.5
        })))
        .await
        .unwrap();

    assert_eq!(created.valor_total, 13501.5);
    let items: Vec<_> = controller.items().into_iter().map(|d| d.item).collect();
    assert_eq!(items, ["Notebook", "Cadeira"]);
}

#[tokio::test]
async fn update_replaces_in_place_and_delete_removes() {
    let store = Rc::new(MemoryStore::new("unidades").with_rows([
        unidade("u1", "A", "A"),
        unidade("u2", "B", "B"),
        unidade("u3", "C", "C"),
    ]));
    let controller = CollectionController::open(Rc::clone(&store), quiet())
        .await
        .insert_position(InsertPosition::Back);

    let updated = controller
        .update("u2", fields(json!({ "nome": "Bê" })))
        .await
        .unwrap();
    assert_eq!(updated.nome, "Bê");
    let names: Vec<_> = controller.items().into_iter().map(|u| u.nome).collect();
    assert_eq!(names, ["A", "Bê", "C"]);

    controller.delete("u1").await.unwrap();
    let ids: Vec<_> = controller.items().into_iter().map(|u| u.id).collect();
    assert_eq!(ids, ["u2", "u3"]);
}

#[tokio::test]
async fn mutation_failures_leave_state_untouched() {
    let store = Rc::new(MemoryStore::new("unidades").with_rows([unidade("u1", "A", "A")]));
    let controller = CollectionController::open(Rc::clone(&store), quiet()).await;
    let before = controller.state().get();

    let missing = controller.delete("nope").await.unwrap_err();
    assert_eq!(missing.category, ErrorCategory::NotFound);

    store.fail_next(StoreOp::Update, RawError::with_code(500u16, "Internal Server Error"));
    let network = controller
        .update("u1", fields(json!({ "nome": "Z" })))
        .await
        .unwrap_err();
    assert!(network.is_network());

    store.fail_next(StoreOp::Create, RawError::with_code("42501", "permission denied"));
    let denied = controller
        .create(fields(json!({ "nome": "Z", "sigla": "Z" })))
        .await
        .unwrap_err();
    assert!(denied.is_permission());
    assert_eq!(denied.icon, "🔒");

    assert_eq!(controller.state().get(), before);
}

#[tokio::test]
async fn every_store_call_is_counted() {
    let before = store_calls_total();
    let store = Rc::new(MemoryStore::new("unidades").with_rows([unidade("u1", "A", "A")]));
    let controller = CollectionController::open(Rc::clone(&store), quiet()).await;
    controller.refresh().await.unwrap();
    assert!(store_calls_total() >= before + 2);
    assert_eq!(store.call_count(StoreOp::GetAll), 2);
}

/// Store whose updates complete only when the test releases them.
struct GatedStore {
    rows: Vec<Document>,
    gates: RefCell<VecDeque<oneshot::Receiver<Document>>>,
}

#[async_trait(?Send)]
impl RemoteStore for GatedStore {
    type Entity = Document;
    type Draft = Fields;
    type Patch = Fields;

    fn resource(&self) -> &str {
        "gated"
    }

    async fn get_all(&self) -> Result<Vec<Document>, RawError> {
        Ok(self.rows.clone())
    }

    async fn create(&self, _draft: Fields) -> Result<Document, RawError> {
        Err(RawError::with_code("42501", "read only"))
    }

    async fn update(&self, _id: &str, _patch: Fields) -> Result<Document, RawError> {
        let gate = self.gates.borrow_mut().pop_front();
        match gate {
            Some(rx) => rx.await.map_err(|_| RawError::new("gate dropped")),
            None => Err(RawError::new("no gate")),
        }
    }

    async fn delete(&self, _id: &str) -> Result<(), RawError> {
        Ok(())
    }
}

#[tokio::test]
async fn overlapping_updates_last_completion_wins() {
    let (tx1, rx1) = oneshot::channel();
    let (tx2, rx2) = oneshot::channel();
    let store = Rc::new(GatedStore {
        rows: vec![Document::new("d1", fields(json!({ "v": 0 })))],
        gates: RefCell::new(VecDeque::from([rx1, rx2])),
    });
    let controller = CollectionController::open(store, quiet()).await;

    let mut first = Box::pin(controller.update("d1", fields(json!({ "v": 1 }))));
    let mut second = Box::pin(controller.update("d1", fields(json!({ "v": 2 }))));
    assert!(futures::poll!(first.as_mut()).is_pending());
    assert!(futures::poll!(second.as_mut()).is_pending());

    tx2.send(Document::new("d1", fields(json!({ "v": 2 }))))
        .unwrap();
    second.await.unwrap();
    tx1.send(Document::new("d1", fields(json!({ "v": 1 }))))
        .unwrap();
    first.await.unwrap();

    let items = controller.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].fields["v"], json!(1));
}
