//! SeaORM entity models
//!
//! Database entities for LitScout. `paper_embeddings`/`concept_embeddings`
//! have no entity here — pgvector's `vector` column type has no native
//! sea-orm mapping, so the `Store` talks to those two tables exclusively
//! through raw `Statement::from_sql_and_values` (teacher's
//! `crates/common/src/db/repository.rs` pattern).

mod author;
mod concept;
mod ingested_concept;
mod paper;
mod paper_author;
mod source;

pub use author::{
    ActiveModel as AuthorActiveModel, Column as AuthorColumn, Entity as AuthorEntity,
    Model as Author,
};

pub use concept::{
    ActiveModel as ConceptActiveModel, Column as ConceptColumn, Entity as ConceptEntity,
    Model as Concept,
};

pub use ingested_concept::{
    ActiveModel as IngestedConceptActiveModel, Column as IngestedConceptColumn,
    Entity as IngestedConceptEntity, Model as IngestedConcept,
};

pub use paper::{
    ActiveModel as PaperActiveModel, Column as PaperColumn, Entity as PaperEntity, Model as Paper,
};

pub use paper_author::{
    ActiveModel as PaperAuthorActiveModel, Column as PaperAuthorColumn,
    Entity as PaperAuthorEntity, Model as PaperAuthor,
};

pub use source::{
    ActiveModel as SourceActiveModel, Column as SourceColumn, Entity as SourceEntity,
    Model as Source,
};
