use super::Context;
use crate::github::UserDetail;
use std::collections::HashMap;
use tracing as log;

/// Account details looked up during one cycle; never persisted.
#[derive(Default)]
pub(super) struct UserCache {
    users: HashMap<String, UserDetail>,
}

impl UserCache {
    pub(super) async fn get(&mut self, ctx: &Context, login: &str) -> anyhow::Result<&UserDetail> {
        if !self.users.contains_key(login) {
            log::trace!("looking up user {login}");
            let detail = ctx.github.user(login).await?;
            self.users.insert(login.to_string(), detail);
        }
        Ok(&self.users[login])
    }
}

/// Names of every repository in the organization.
pub(super) async fn repo_names(ctx: &Context) -> anyhow::Result<Vec<String>> {
    Ok(ctx
        .github
        .org_repos()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect())
}
