//! Tag use-case service.
//!
//! # Invariants
//! - Tag names are unique case-insensitively; duplicates are `Conflict`.
//! - `sort` and `fields` are validated before the repository is touched.

use crate::config::PagingConfig;
use crate::model::now_epoch_ms;
use crate::model::tag::{CreateTagDto, Tag, TagDto, UpdateTagDto};
use crate::query::{fetch_page, PageRequest, PaginationResult, QueryEngine, ShapedView};
use crate::repo::tag_repo::{TagFilter, TagRepository};
use crate::service::{ServiceError, ServiceResult};
use log::info;

/// Client list parameters for tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQueryParameters {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Tag service facade over repository implementations.
pub struct TagService<R: TagRepository> {
    repo: R,
    engine: QueryEngine,
    paging: PagingConfig,
}

impl<R: TagRepository> TagService<R> {
    pub fn new(repo: R, engine: QueryEngine, paging: PagingConfig) -> Self {
        Self {
            repo,
            engine,
            paging,
        }
    }

    pub fn list_tags(
        &self,
        params: &TagQueryParameters,
    ) -> ServiceResult<PaginationResult<ShapedView>> {
        let sort = params.sort.as_deref();
        let fields = params.fields.as_deref();
        self.engine.check_sort::<TagDto, Tag>(sort)?;
        self.engine.check_fields::<TagDto>(fields)?;

        let compiled = self.engine.compile_sort::<TagDto, Tag>(sort)?;
        let request = PageRequest::normalized(params.page, params.page_size, &self.paging);
        let filter = TagFilter {
            search: params.search.clone(),
        };
        let page = fetch_page(&self.repo, &filter, &compiled, request)?;

        Ok(page.map_items(|tags| {
            let dtos: Vec<TagDto> = tags.iter().map(Tag::to_dto).collect();
            self.engine.shape_many(&dtos, fields)
        }))
    }

    pub fn get_tag(&self, id: &str, fields: Option<&str>) -> ServiceResult<ShapedView> {
        self.engine.check_fields::<TagDto>(fields)?;
        let tag = self.load(id)?;
        Ok(self.engine.shape(&tag.to_dto(), fields))
    }

    pub fn create_tag(&self, dto: CreateTagDto) -> ServiceResult<TagDto> {
        dto.validate()?;
        self.ensure_name_free(&dto.name, None)?;

        let tag = dto.into_entity(now_epoch_ms());
        self.repo.create_tag(&tag)?;
        info!("event=tag_created module=service status=ok tag_id={}", tag.id);
        Ok(tag.to_dto())
    }

    pub fn update_tag(&self, id: &str, dto: UpdateTagDto) -> ServiceResult<TagDto> {
        dto.validate()?;
        let mut tag = self.load(id)?;
        self.ensure_name_free(&dto.name, Some(id))?;

        tag.apply_update(dto, now_epoch_ms());
        self.repo.update_tag(&tag)?;
        Ok(tag.to_dto())
    }

    /// Deletes a tag and, by cascade, its habit links.
    pub fn delete_tag(&self, id: &str) -> ServiceResult<()> {
        self.repo.delete_tag(id)?;
        info!("event=tag_deleted module=service status=ok tag_id={id}");
        Ok(())
    }

    fn load(&self, id: &str) -> ServiceResult<Tag> {
        self.repo.get_tag(id)?.ok_or_else(|| ServiceError::NotFound {
            entity: "tag",
            id: id.to_string(),
        })
    }

    fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> ServiceResult<()> {
        if self.repo.name_taken(name, except_id)? {
            return Err(ServiceError::Conflict(format!(
                "tag with name `{}` already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}
