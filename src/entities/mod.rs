//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod actor;
pub mod comment;
pub mod email;
pub mod equipment;
pub mod equipment_type;
pub mod harvest;
pub mod harvest_equipment;
pub mod harvest_tree;
pub mod harvest_yield;
pub mod onboarding;
pub mod onboarding_member;
pub mod organization;
pub mod participation;
pub mod person;
pub mod property;
pub mod property_tree;
pub mod tree_type;
pub mod user;
pub mod user_role;

// Re-export specific types to avoid conflicts
pub use actor::{ActorKind, Entity as Actor, Model as ActorModel};
pub use comment::{Entity as Comment, Model as CommentModel};
pub use email::{Entity as Email, EmailKind, Model as EmailModel};
pub use equipment::{Column as EquipmentColumn, Entity as Equipment, Model as EquipmentModel};
pub use equipment_type::{Entity as EquipmentType, Model as EquipmentTypeModel};
pub use harvest::{
    Column as HarvestColumn, Entity as Harvest, HarvestStatus, Model as HarvestModel,
};
pub use harvest_equipment::{Entity as HarvestEquipment, Model as HarvestEquipmentModel};
pub use harvest_tree::{Entity as HarvestTree, Model as HarvestTreeModel};
pub use harvest_yield::{Entity as HarvestYield, Model as HarvestYieldModel};
pub use onboarding::{Entity as Onboarding, Model as OnboardingModel};
pub use onboarding_member::{Entity as OnboardingMember, Model as OnboardingMemberModel};
pub use organization::{
    Column as OrganizationColumn, Entity as Organization, Model as OrganizationModel,
};
pub use participation::{
    Column as ParticipationColumn, Entity as Participation, Model as ParticipationModel,
    ParticipationStatus,
};
pub use person::{Column as PersonColumn, Entity as Person, Language, Model as PersonModel};
pub use property::{Column as PropertyColumn, Entity as Property, Model as PropertyModel};
pub use property_tree::{Entity as PropertyTree, Model as PropertyTreeModel};
pub use tree_type::{Entity as TreeType, Model as TreeTypeModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use user_role::{Entity as UserRole, Model as UserRoleModel, Role};
