mod common;

use std::sync::atomic::Ordering;

use common::{descriptor, harness, ALICE, BOB};
use ketos_services::{FeatureUpdate, ServiceError};
use ketos_shared::EnvironmentStatus;

#[tokio::test]
async fn image_names_are_unique_case_insensitively() {
    let h = harness().await;
    let image = h.image("Python-ML").await;
    assert_eq!(image.name, "python-ml");

    let err = h.images.create("PYTHON-ml", None, None, BOB).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let found = h.images.get_by_name("python-ML").await.unwrap().unwrap();
    assert_eq!(found.id, image.id);
}

#[tokio::test]
async fn image_in_use_cannot_be_deleted() {
    let h = harness().await;
    let fx = h.fixture(false).await;

    let err = h.images.delete(fx.image.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let unused = h.image("r-base").await;
    h.images.delete(unused.id).await.unwrap();
    assert!(h.images.get_by_name("r-base").await.unwrap().is_none());
}

#[tokio::test]
async fn environment_create_runs_container_and_records_notebook() {
    let h = harness().await;
    let image = h.image("python-ml").await;

    let env = h
        .environments
        .create("research", None, image.id, ALICE)
        .await
        .unwrap();

    assert!(env.is_running());
    assert_eq!(env.creator_id, ALICE.id);
    assert_eq!(env.container_id.as_deref(), Some(format!("id-{}", env.container_name).as_str()));
    assert!(h.environments.data_directory(&env).is_dir());
    assert_eq!(
        h.runtime.calls(),
        vec![format!("run {} python-ml", env.container_name)]
    );

    let info = h.environments.to_info(env);
    assert_eq!(info.status, EnvironmentStatus::Running);
    assert!(info.jupyter_url.unwrap().ends_with("/?token=secret-token"));
}

#[tokio::test]
async fn unreachable_environment_is_discarded() {
    let h = harness().await;
    let image = h.image("python-ml").await;
    h.api.unreachable.store(true, Ordering::SeqCst);

    let err = h
        .environments
        .create("research", None, image.id, ALICE)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotReady { .. }));
    assert!(h.environments.list().await.unwrap().is_empty());
    let calls = h.runtime.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].starts_with("remove id-"));
}

#[tokio::test]
async fn running_environment_must_be_stopped_before_delete() {
    let h = harness().await;
    let fx = h.fixture(false).await;
    let env_id = fx.environment.id;

    let err = h.environments.delete(env_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let stopped = h.environments.stop(env_id).await.unwrap();
    assert_eq!(stopped.status(), EnvironmentStatus::Stopped);

    h.environments.delete(env_id).await.unwrap();
    assert!(matches!(
        h.environments.get(env_id).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        h.models.get(fx.model.id).await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn restarting_environment_refreshes_status() {
    let h = harness().await;
    let fx = h.fixture(false).await;
    let env_id = fx.environment.id;

    h.environments.stop(env_id).await.unwrap();
    let started = h.environments.start(env_id).await.unwrap();

    assert!(started.is_running());
    assert_eq!(started.jupyter_token.as_deref(), Some("secret-token"));
    let calls = h.runtime.calls();
    assert!(calls.iter().any(|c| c.starts_with("stop ")));
    assert!(calls.iter().any(|c| c.starts_with("start ")));
}

#[tokio::test]
async fn listings_are_scoped_by_creator() {
    let h = harness().await;
    let image = h.image("python-ml").await;
    h.environments.create("a", None, image.id, ALICE).await.unwrap();
    h.environments.create("b", None, image.id, BOB).await.unwrap();

    assert_eq!(h.environments.list().await.unwrap().len(), 2);
    let mine = h.environments.list_by_creator(BOB).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].name, "b");
}

#[tokio::test]
async fn features_are_unique_by_natural_key() {
    let h = harness().await;
    let age = h
        .features
        .create(&descriptor("warehouse", "column", "age"), ALICE)
        .await
        .unwrap();

    let err = h
        .features
        .create(&descriptor("warehouse", "column", "age"), BOB)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let found = h
        .features
        .get_by_natural_key("warehouse", "column", "age")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, age.id);
}

#[tokio::test]
async fn feature_update_cannot_collide() {
    let h = harness().await;
    h.features
        .create(&descriptor("warehouse", "column", "age"), ALICE)
        .await
        .unwrap();
    let tenure = h
        .features
        .create(&descriptor("warehouse", "column", "tenure"), ALICE)
        .await
        .unwrap();

    let err = h
        .features
        .update(
            tenure.id,
            FeatureUpdate {
                value: Some("age".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let renamed = h
        .features
        .update(
            tenure.id,
            FeatureUpdate {
                description: Some("months as customer".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.value, "tenure");
    assert_eq!(renamed.description.as_deref(), Some("months as customer"));
}

#[tokio::test]
async fn feature_set_membership_operations() {
    let h = harness().await;
    let set = h.feature_sets.create(Some("s".into()), None, ALICE).await.unwrap();
    let mut ids = Vec::new();
    for value in ["a", "b", "c"] {
        ids.push(
            h.features
                .create(&descriptor("r", "p", value), ALICE)
                .await
                .unwrap()
                .id,
        );
    }

    let members = h.feature_sets.add_features(set.id, &ids[..2]).await.unwrap();
    assert_eq!(members.len(), 2);

    let members = h.feature_sets.add_features(set.id, &ids).await.unwrap();
    assert_eq!(members.len(), 3);

    let members = h.feature_sets.remove_features(set.id, &ids[..1]).await.unwrap();
    assert_eq!(members.iter().map(|f| f.id).collect::<Vec<_>>(), ids[1..].to_vec());

    let members = h.feature_sets.replace_features(set.id, &ids[..1]).await.unwrap();
    assert_eq!(members.iter().map(|f| f.id).collect::<Vec<_>>(), vec![ids[0]]);

    let err = h.feature_sets.add_features(set.id, &[9999]).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { kind: "feature", .. }));

    let info = h.feature_sets.info(set.id).await.unwrap();
    assert_eq!(info.features.len(), 1);
}

#[tokio::test]
async fn deleting_feature_drops_membership() {
    let h = harness().await;
    let fx = h.fixture(true).await;
    let set = fx.feature_set.unwrap();
    let first = h.feature_sets.features(set.id).await.unwrap()[0].id;

    h.features.delete(first).await.unwrap();

    assert_eq!(h.feature_sets.features(set.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_feature_set_unlinks_models() {
    let h = harness().await;
    let fx = h.fixture(true).await;
    let set = fx.feature_set.unwrap();

    h.feature_sets.delete(set.id).await.unwrap();

    let model = h.models.get(fx.model.id).await.unwrap();
    assert!(model.feature_set_id.is_none());
    assert_eq!(h.features.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn model_names_are_unique_per_environment() {
    let h = harness().await;
    let fx = h.fixture(false).await;

    let err = h
        .models
        .create("churn", None, fx.environment.id, None, ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let other = h
        .models
        .create("upsell", None, fx.environment.id, None, ALICE)
        .await
        .unwrap();
    assert_ne!(other.ml_model_name, fx.model.ml_model_name);
    assert_eq!(
        h.models
            .list_for_environment(fx.environment.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn model_feature_set_link_can_be_changed() {
    let h = harness().await;
    let fx = h.fixture(true).await;

    let cleared = h.models.update(fx.model.id, None, Some(None)).await.unwrap();
    assert!(cleared.feature_set_id.is_none());

    let err = h
        .models
        .update(fx.model.id, None, Some(Some(777)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { kind: "feature set", .. }));

    let set_id = fx.feature_set.unwrap().id;
    let relinked = h
        .models
        .update(fx.model.id, Some("v2".into()), Some(Some(set_id)))
        .await
        .unwrap();
    assert_eq!(relinked.feature_set_id, Some(set_id));
    assert_eq!(relinked.description.as_deref(), Some("v2"));
}
