//! Map tile imagery from templated `{z}/{x}/{y}` URLs.

use futures_util::FutureExt;
use reqwest::Client;

use crate::cache::keys;
use crate::config::{TileConfig, TileEndpoint};
use crate::error::GeoResult;
use crate::providers::http::read_bytes;
use crate::providers::ProviderContext;
use crate::types::{TileCoord, TileData};

pub const OP_TILE: &str = "tile";

#[derive(Debug, Clone)]
pub struct TileClient {
    ctx: ProviderContext,
    primary: TileEndpoint,
    fallback: Option<TileEndpoint>,
    max_zoom: u8,
}

impl TileClient {
    pub fn new(ctx: ProviderContext, config: &TileConfig) -> Self {
        Self {
            ctx,
            primary: config.primary.clone(),
            fallback: config.fallback.clone(),
            max_zoom: config.max_zoom,
        }
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub async fn tile(&self, tile: TileCoord) -> GeoResult<TileData> {
        tile.validate(self.max_zoom)?;

        let key = keys::tile_key(&tile);
        let http = &self.ctx.http;
        let primary = self
            .ctx
            .metered(&self.primary.name, OP_TILE, fetch_tile(http, &self.primary, tile));
        let fallback = self
            .fallback
            .as_ref()
            .filter(|_| self.ctx.fallback_enabled)
            .map(|endpoint| {
                self.ctx
                    .metered(&endpoint.name, OP_TILE, fetch_tile(http, endpoint, tile))
                    .boxed()
            });

        self.ctx
            .cached(OP_TILE, &self.ctx.cache.tiles, &key, primary, fallback)
            .await
    }
}

async fn fetch_tile(http: &Client, endpoint: &TileEndpoint, tile: TileCoord) -> GeoResult<TileData> {
    let url = tile.fill_template(&endpoint.url_template);
    let response = http.get(url).send().await?;
    let bytes = read_bytes(&endpoint.name, response).await?;
    tracing::trace!(provider = %endpoint.name, %tile, bytes = bytes.len(), "Fetched tile");
    Ok(TileData(bytes))
}
