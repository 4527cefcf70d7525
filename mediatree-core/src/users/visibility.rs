use mediatree_model::{Entity, User};

use crate::error::Result;
use crate::store::EntityStore;

fn is_blocked_library(entity: &Entity, user: &User) -> bool {
    user.policy.blocked_media_folders.iter().any(|blocked| {
        entity.id.matches_str(blocked) || blocked.eq_ignore_ascii_case(&entity.name)
    })
}

fn has_blocked_tag(entity: &Entity, user: &User) -> bool {
    if entity.is_collection_folder() || entity.is_root() {
        return false;
    }
    user.policy.blocked_tags.iter().any(|tag| entity.has_tag(tag))
}

/// Whether `user` may see `entity` on its own.
///
/// Only the entity itself is checked. Callers walking the tree check each
/// folder on the way down and stop at the first hidden one.
pub fn is_visible(entity: &Entity, user: &User) -> bool {
    if entity.is_collection_folder() {
        if is_blocked_library(entity, user) {
            return false;
        }
        if !user.policy.enable_all_folders
            && !user.policy.enabled_folders.contains(&entity.id)
        {
            return false;
        }
    }
    !has_blocked_tag(entity, user)
}

/// Tags the store should hide on behalf of `user`.
pub fn excluded_tags(user: Option<&User>) -> Vec<String> {
    user.map(|u| u.policy.blocked_tags.clone()).unwrap_or_default()
}

/// Owned descendants of `root` in depth-first discovery order, pruned at
/// every entity `user` cannot see. Without a user nothing is pruned.
pub async fn visible_descendants(
    store: &dyn EntityStore,
    root: &Entity,
    user: Option<&User>,
) -> Result<Vec<Entity>> {
    let mut out = Vec::new();
    let mut stack = visible_children(store, root, user).await?;
    stack.reverse();
    while let Some(entity) = stack.pop() {
        if entity.is_folder() {
            let mut children = visible_children(store, &entity, user).await?;
            children.reverse();
            stack.extend(children);
        }
        out.push(entity);
    }
    Ok(out)
}

async fn visible_children(
    store: &dyn EntityStore,
    folder: &Entity,
    user: Option<&User>,
) -> Result<Vec<Entity>> {
    let ids = store.list_child_ids(folder.id).await?;
    let mut children = store.get_many(&ids).await?;
    if let Some(user) = user {
        children.retain(|child| is_visible(child, user));
    }
    Ok(children)
}
