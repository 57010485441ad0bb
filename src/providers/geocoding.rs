//! Forward and reverse geocoding.
//!
//! Two response schemas are understood: Nominatim (free, JSON array of
//! places) and Pelias (keyed, GeoJSON feature collection). Each has one
//! adapter into [`Place`].

use futures_util::FutureExt;
use reqwest::Client;
use serde::Deserialize;

use crate::cache::keys;
use crate::config::{GeocodeSchema, GeocodingConfig, GeocodingEndpoint};
use crate::error::{GeoError, GeoResult};
use crate::providers::http::read_json;
use crate::providers::ProviderContext;
use crate::types::{Coordinate, LocationBias, Place};

pub const OP_GEOCODE: &str = "geocode";
pub const OP_REVERSE: &str = "reverse_geocode";

const REVERSE_ZOOM: &str = "18";

#[derive(Debug, Clone)]
pub struct GeocodingClient {
    ctx: ProviderContext,
    primary: GeocodingEndpoint,
    fallback: Option<GeocodingEndpoint>,
}

impl GeocodingClient {
    pub fn new(ctx: ProviderContext, config: &GeocodingConfig) -> Self {
        Self {
            ctx,
            primary: config.primary.clone(),
            fallback: config.fallback.clone(),
        }
    }

    fn fallback(&self) -> Option<&GeocodingEndpoint> {
        self.fallback.as_ref().filter(|_| self.ctx.fallback_enabled)
    }

    /// Places matching `query`, best match first. An empty list means the
    /// providers found nothing; it is cached like any other answer.
    pub async fn geocode(&self, query: &str, bias: Option<&LocationBias>) -> GeoResult<Vec<Place>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeoError::InvalidRequest("empty geocoding query".to_string()));
        }
        if let Some(bias) = bias {
            if !bias.center.is_valid() {
                return Err(GeoError::InvalidRequest(format!(
                    "invalid bias center {}",
                    bias.center
                )));
            }
        }

        let key = keys::geocode_key(query, bias);
        let http = &self.ctx.http;
        let primary = self.ctx.metered(
            &self.primary.name,
            OP_GEOCODE,
            search(http, &self.primary, query, bias),
        );
        let fallback = self.fallback().map(|endpoint| {
            self.ctx
                .metered(&endpoint.name, OP_GEOCODE, search(http, endpoint, query, bias))
                .boxed()
        });

        self.ctx
            .cached(OP_GEOCODE, &self.ctx.cache.geocodes, &key, primary, fallback)
            .await
    }

    /// Nearest address to `coordinate`, `None` when the providers know none.
    pub async fn reverse_geocode(&self, coordinate: Coordinate) -> GeoResult<Option<Place>> {
        if !coordinate.is_valid() {
            return Err(GeoError::InvalidRequest(format!("invalid coordinate {coordinate}")));
        }

        let key = keys::reverse_key(&coordinate);
        let http = &self.ctx.http;
        let primary = self.ctx.metered(
            &self.primary.name,
            OP_REVERSE,
            reverse(http, &self.primary, coordinate),
        );
        let fallback = self.fallback().map(|endpoint| {
            self.ctx
                .metered(&endpoint.name, OP_REVERSE, reverse(http, endpoint, coordinate))
                .boxed()
        });

        let places = self
            .ctx
            .cached(OP_REVERSE, &self.ctx.cache.geocodes, &key, primary, fallback)
            .await?;
        Ok(places.into_iter().next())
    }
}

async fn search(
    http: &Client,
    endpoint: &GeocodingEndpoint,
    query: &str,
    bias: Option<&LocationBias>,
) -> GeoResult<Vec<Place>> {
    match endpoint.schema {
        GeocodeSchema::Nominatim => nominatim::search(http, endpoint, query, bias).await,
        GeocodeSchema::Pelias => pelias::search(http, endpoint, query, bias).await,
    }
}

async fn reverse(
    http: &Client,
    endpoint: &GeocodingEndpoint,
    coordinate: Coordinate,
) -> GeoResult<Vec<Place>> {
    match endpoint.schema {
        GeocodeSchema::Nominatim => nominatim::reverse(http, endpoint, coordinate).await,
        GeocodeSchema::Pelias => pelias::reverse(http, endpoint, coordinate).await,
    }
}

fn endpoint_url(endpoint: &GeocodingEndpoint, path: &str) -> String {
    format!("{}/{path}", endpoint.base_url.trim_end_matches('/'))
}

mod nominatim {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct NominatimPlace {
        display_name: String,
        lat: String,
        lon: String,
        #[serde(rename = "type")]
        kind: Option<String>,
        importance: Option<f64>,
    }

    /// `/reverse` answers either a place or `{"error": "..."}`.
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub(super) enum NominatimReverse {
        Found(NominatimPlace),
        NotFound { error: String },
    }

    pub(super) fn into_place(raw: NominatimPlace, provider: &str) -> GeoResult<Place> {
        let parse = |v: &str| {
            v.parse::<f64>()
                .map_err(|e| GeoError::provider(provider, format!("bad coordinate '{v}': {e}")))
        };
        Ok(Place {
            coordinate: Coordinate::new(parse(&raw.lat)?, parse(&raw.lon)?)
                .map_err(|e| GeoError::provider(provider, e.to_string()))?,
            display_name: raw.display_name,
            category: raw.kind,
            relevance: raw.importance,
            provider: provider.to_string(),
        })
    }

    pub(super) async fn search(
        http: &Client,
        endpoint: &GeocodingEndpoint,
        query: &str,
        bias: Option<&LocationBias>,
    ) -> GeoResult<Vec<Place>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(bias) = bias {
            params.push(("lat", bias.center.lat.to_string()));
            params.push(("lon", bias.center.lon.to_string()));
            if let Some(vb) = bias.viewbox {
                params.push((
                    "viewbox",
                    format!("{},{},{},{}", vb.min_lon, vb.min_lat, vb.max_lon, vb.max_lat),
                ));
                if bias.bounded {
                    params.push(("bounded", "1".to_string()));
                }
            }
        }

        let response = http
            .get(endpoint_url(endpoint, "search"))
            .query(&params)
            .send()
            .await?;
        let raw: Vec<NominatimPlace> = read_json(&endpoint.name, response).await?;
        raw.into_iter()
            .map(|p| into_place(p, &endpoint.name))
            .collect()
    }

    pub(super) async fn reverse(
        http: &Client,
        endpoint: &GeocodingEndpoint,
        coordinate: Coordinate,
    ) -> GeoResult<Vec<Place>> {
        let response = http
            .get(endpoint_url(endpoint, "reverse"))
            .query(&[
                ("lat", coordinate.lat.to_string()),
                ("lon", coordinate.lon.to_string()),
                ("format", "json".to_string()),
                ("zoom", REVERSE_ZOOM.to_string()),
            ])
            .send()
            .await?;
        match read_json::<NominatimReverse>(&endpoint.name, response).await? {
            NominatimReverse::Found(place) => Ok(vec![into_place(place, &endpoint.name)?]),
            NominatimReverse::NotFound { error } => {
                tracing::debug!(provider = %endpoint.name, %coordinate, error = %error, "No address at coordinate");
                Ok(Vec::new())
            }
        }
    }
}

mod pelias {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct FeatureCollection {
        #[serde(default)]
        features: Vec<Feature>,
    }

    #[derive(Debug, Deserialize)]
    struct Feature {
        geometry: Geometry,
        properties: Properties,
    }

    #[derive(Debug, Deserialize)]
    struct Geometry {
        /// `[lon, lat]`
        coordinates: [f64; 2],
    }

    #[derive(Debug, Deserialize)]
    struct Properties {
        label: String,
        layer: Option<String>,
        confidence: Option<f64>,
    }

    pub(super) fn into_places(fc: FeatureCollection, provider: &str) -> GeoResult<Vec<Place>> {
        fc.features
            .into_iter()
            .map(|f| {
                let [lon, lat] = f.geometry.coordinates;
                Ok(Place {
                    display_name: f.properties.label,
                    coordinate: Coordinate::new(lat, lon)
                        .map_err(|e| GeoError::provider(provider, e.to_string()))?,
                    category: f.properties.layer,
                    relevance: f.properties.confidence,
                    provider: provider.to_string(),
                })
            })
            .collect()
    }

    fn api_key<'a>(endpoint: &'a GeocodingEndpoint) -> GeoResult<&'a str> {
        endpoint.api_key.as_deref().ok_or_else(|| GeoError::Auth {
            provider: endpoint.name.clone(),
            reason: "no API key configured".to_string(),
        })
    }

    pub(super) async fn search(
        http: &Client,
        endpoint: &GeocodingEndpoint,
        query: &str,
        bias: Option<&LocationBias>,
    ) -> GeoResult<Vec<Place>> {
        let mut params = vec![("text", query.to_string())];
        if let Some(bias) = bias {
            params.push(("focus.point.lat", bias.center.lat.to_string()));
            params.push(("focus.point.lon", bias.center.lon.to_string()));
            if let (Some(vb), true) = (bias.viewbox, bias.bounded) {
                params.push(("boundary.rect.min_lon", vb.min_lon.to_string()));
                params.push(("boundary.rect.min_lat", vb.min_lat.to_string()));
                params.push(("boundary.rect.max_lon", vb.max_lon.to_string()));
                params.push(("boundary.rect.max_lat", vb.max_lat.to_string()));
            }
        }

        let response = http
            .get(endpoint_url(endpoint, "search"))
            .header("Authorization", api_key(endpoint)?)
            .query(&params)
            .send()
            .await?;
        let fc: FeatureCollection = read_json(&endpoint.name, response).await?;
        into_places(fc, &endpoint.name)
    }

    pub(super) async fn reverse(
        http: &Client,
        endpoint: &GeocodingEndpoint,
        coordinate: Coordinate,
    ) -> GeoResult<Vec<Place>> {
        let response = http
            .get(endpoint_url(endpoint, "reverse"))
            .header("Authorization", api_key(endpoint)?)
            .query(&[
                ("point.lat", coordinate.lat.to_string()),
                ("point.lon", coordinate.lon.to_string()),
                ("size", "1".to_string()),
            ])
            .send()
            .await?;
        let fc: FeatureCollection = read_json(&endpoint.name, response).await?;
        into_places(fc, &endpoint.name)
    }
}
