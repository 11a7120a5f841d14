//! Tantivy-based technician directory index.
//!
//! Provides full-text search over technician profiles with field boosting.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Role, User};

/// Field boosts: names and specialties matter most.
const BOOST_FULL_NAME: f32 = 10.0;
const BOOST_SPECIALTIES: f32 = 8.5;
const BOOST_SKILLS: f32 = 6.0;
const BOOST_SERVICE_AREAS: f32 = 5.0;
const BOOST_BIO: f32 = 2.5;

/// Search result with technician id and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub user_id: String,
    pub score: f32,
}

struct SearchFields {
    user_id: Field,
    full_name: Field,
    specialties: Field,
    skills: Field,
    service_areas: Field,
    bio: Field,
}

/// Tantivy search index for technicians.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        // Raw (untokenized) so documents can be deleted by id
        let user_id = schema_builder.add_text_field("user_id", STRING | STORED);
        let full_name = schema_builder.add_text_field("full_name", TEXT);
        let specialties = schema_builder.add_text_field("specialties", TEXT);
        let skills = schema_builder.add_text_field("skills", TEXT);
        let service_areas = schema_builder.add_text_field("service_areas", TEXT);
        let bio = schema_builder.add_text_field("bio", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            user_id,
            full_name,
            specialties,
            skills,
            service_areas,
            bio,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the given technicians.
    pub async fn rebuild(&self, technicians: &[User]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;

        for technician in technicians {
            if let Some(doc) = self.create_document(technician) {
                writer.add_document(doc)?;
            }
        }

        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} technicians", technicians.len());
        Ok(())
    }

    /// Index or re-index one user. Users who are not technicians are removed.
    pub async fn index_technician(&self, user: &User) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        let term = tantivy::Term::from_field_text(self.fields.user_id, &user.id);
        writer.delete_term(term);

        if let Some(doc) = self.create_document(user) {
            writer.add_document(doc)?;
        }
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search technicians matching the query, best match first.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        // Never ask the collector for more hits than there are documents
        let num_docs = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if offset >= num_docs {
            return Ok(Vec::new());
        }
        let fetch = limit.saturating_add(offset).min(num_docs);

        let field_boosts = [
            (self.fields.full_name, BOOST_FULL_NAME),
            (self.fields.specialties, BOOST_SPECIALTIES),
            (self.fields.skills, BOOST_SKILLS),
            (self.fields.service_areas, BOOST_SERVICE_AREAS),
            (self.fields.bio, BOOST_BIO),
        ];

        let query_parser = QueryParser::for_index(
            &self.index,
            field_boosts.iter().map(|(field, _)| *field).collect(),
        );

        // Syntax errors are the caller's fault
        let base_query = query_parser
            .parse_query(query_str)
            .map_err(|e| AppError::BadRequest(format!("Invalid search query: {}", e)))?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();
        for (field, boost) in field_boosts {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&combined_query, &TopDocs::with_limit(fetch))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let user_id = doc.get_first(self.fields.user_id)?.as_str()?.to_string();
                Some(SearchResult { user_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, user: &User) -> Option<TantivyDocument> {
        if user.role != Role::Technician {
            return None;
        }
        let profile = user.technician_profile.clone().unwrap_or_default();

        Some(doc!(
            self.fields.user_id => user.id.clone(),
            self.fields.full_name => user.profile.full_name.clone(),
            self.fields.specialties => profile.specialties.join(" "),
            self.fields.skills => profile.skills.join(" "),
            self.fields.service_areas => profile.service_areas.join(" "),
            self.fields.bio => profile.bio.unwrap_or_default()
        ))
    }
}
