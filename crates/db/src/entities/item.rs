use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub room: Option<String>,
    pub photo_path: Option<String>,
    pub purchase_date: Option<Date>,
    pub warranty_expiration_date: Option<Date>,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::item_document::Entity")]
    Documents,
    #[sea_orm(has_many = "super::maintenance_task::Entity")]
    MaintenanceTasks,
}

impl Related<super::item_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl Related<super::maintenance_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaintenanceTasks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
