//! Database configuration module.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`'s
//! `Schema::create_table_from_entity`, so the database schema always matches
//! the entity definitions without hand-written SQL.

use crate::entities::{
    Actor, Comment, Email, Equipment, EquipmentType, Harvest, HarvestEquipment, HarvestTree,
    HarvestYield, Onboarding, OnboardingMember, Organization, Participation, Person, Property,
    PropertyTree, TreeType, User, UserRole,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Establishes a connection using the `DATABASE_URL` environment variable,
/// falling back to a default local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/fruitshare.sqlite".to_string());

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Parents before children so foreign keys resolve
    db.execute(builder.build(&schema.create_table_from_entity(Actor)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Person)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Organization)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(User)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(UserRole)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(TreeType)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Property)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(PropertyTree)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Harvest)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(HarvestTree)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Participation)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(HarvestYield)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(EquipmentType)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Equipment)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(HarvestEquipment)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Comment)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Onboarding)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(OnboardingMember)))
        .await?;
    db.execute(builder.build(&schema.create_table_from_entity(Email)))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{HarvestModel, PropertyModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Tables exist if they can be queried
        let _: Vec<HarvestModel> = Harvest::find().limit(1).all(&db).await?;
        let _: Vec<PropertyModel> = Property::find().limit(1).all(&db).await?;
        Ok(())
    }
}
