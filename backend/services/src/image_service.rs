use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use ketos_shared::Actor;

use crate::entity::{environment, image};
use crate::error::{map_unique_violation, ServiceError, ServiceResult};

/// Registered container templates. Names are stored lower-cased.
pub struct ImageService {
    db: DatabaseConnection,
}

impl ImageService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        name: &str,
        title: Option<String>,
        description: Option<String>,
        actor: Actor,
    ) -> ServiceResult<image::Model> {
        let name = normalize_name(name)?;

        let created = image::ActiveModel {
            name: Set(name.clone()),
            title: Set(title),
            description: Set(description),
            creator_id: Set(Some(actor.id)),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, || format!("image {} already exists", name)))?;

        log::info!("Registered image {} (id {})", created.name, created.id);
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<image::Model> {
        Self::find(&self.db, id).await
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<image::Model> {
        image::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("image", id))
    }

    pub async fn get_by_name(&self, name: &str) -> ServiceResult<Option<image::Model>> {
        Self::find_by_name(&self.db, name).await
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> ServiceResult<Option<image::Model>> {
        let image = image::Entity::find()
            .filter(image::Column::Name.eq(name.trim().to_lowercase()))
            .one(conn)
            .await?;
        Ok(image)
    }

    pub async fn list(&self) -> ServiceResult<Vec<image::Model>> {
        let images = image::Entity::find()
            .order_by_asc(image::Column::Id)
            .all(&self.db)
            .await?;
        Ok(images)
    }

    pub async fn update(
        &self,
        id: i32,
        title: Option<String>,
        description: Option<String>,
    ) -> ServiceResult<image::Model> {
        let mut active: image::ActiveModel = self.get(id).await?.into();
        active.title = Set(title);
        active.description = Set(description);
        Ok(active.update(&self.db).await?)
    }

    /// Images stay immutable while an environment is based on them.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let image = self.get(id).await?;

        let dependents = environment::Entity::find()
            .filter(environment::Column::ImageId.eq(image.id))
            .count(&self.db)
            .await?;
        if dependents > 0 {
            return Err(ServiceError::Conflict(format!(
                "image {} is used by {} environment(s)",
                image.name, dependents
            )));
        }

        image::Entity::delete_by_id(image.id).exec(&self.db).await?;
        log::info!("Deleted image {} (id {})", image.name, image.id);
        Ok(())
    }
}

fn normalize_name(name: &str) -> ServiceResult<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(ServiceError::BadInput("image name must not be empty".to_string()));
    }
    Ok(name)
}
