pub mod attachment_service;
pub mod category_service;
pub mod instance_resolver;
pub mod instance_service;
pub mod instance_writer;
pub mod knowledge_service;
pub mod materializer;
pub mod project_service;
pub mod sync_service;
pub mod template_service;

pub use attachment_service::AttachmentService;
pub use category_service::CategoryService;
pub use instance_service::InstanceService;
pub use knowledge_service::{KnowledgeOwner, KnowledgeService, NewKnowledgeFile};
pub use materializer::LazyMaterializer;
pub use project_service::ProjectService;
pub use sync_service::{SyncReport, SyncService};
pub use template_service::{NewTemplate, TemplateService, TemplateUpdate};
