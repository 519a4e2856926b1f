use crate::config::{Credentials, QueryConfig};
use crate::error::{Result, VegsatError};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Transport timeout applied to every catalog request, downloads included.
/// Expiry surfaces as a per-product Download error rather than hanging the
/// run.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// One inclusive date interval. Intervals produced by
/// [`month_limited_intervals`] never cross a year boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Build one interval per year in `start_year..=end_year`, each spanning the
/// first day of `months[0]` through the last day of `months[1]` of that year.
pub fn month_limited_intervals(
    start_year: i32,
    end_year: i32,
    months: [u32; 2],
) -> Result<Vec<DateInterval>> {
    let [first_month, last_month] = months;
    if start_year > end_year {
        return Err(VegsatError::ConfigInvalid {
            key: "query.date_range.start_year".to_string(),
            reason: format!("start_year {start_year} is after end_year {end_year}"),
        });
    }
    let mut intervals = Vec::with_capacity((end_year - start_year + 1) as usize);
    for year in start_year..=end_year {
        let start = NaiveDate::from_ymd_opt(year, first_month, 1).ok_or_else(|| {
            VegsatError::ConfigInvalid {
                key: "query.date_range.months".to_string(),
                reason: format!("invalid month {first_month}"),
            }
        })?;
        intervals.push(DateInterval {
            start,
            end: last_day_of_month(year, last_month)?,
        });
    }
    Ok(intervals)
}

fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .ok_or_else(|| VegsatError::ConfigInvalid {
            key: "query.date_range.months".to_string(),
            reason: format!("invalid month {month}"),
        })
}

/// Product metadata as returned by the catalog. No pixels, identifiers
/// unique within one query result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub sensing_date: DateTime<Utc>,
    pub cloud_cover: f64,
    pub product_type: String,
    pub platform: String,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "value")]
    value: Vec<ProductRecord>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Filter criteria for one catalog search.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub wkt_area: String,
    pub product_type: String,
    pub platform_name: Option<String>,
    pub cloud_max: f64,
    pub intervals: Vec<DateInterval>,
}

impl ProductFilter {
    pub fn from_config(query: &QueryConfig, wkt_area: String) -> Result<Self> {
        Ok(ProductFilter {
            intervals: month_limited_intervals(
                query.date_range.start_year,
                query.date_range.end_year,
                query.date_range.months,
            )?,
            wkt_area,
            product_type: query.product_type.clone(),
            platform_name: query.platform_name.clone(),
            cloud_max: query.cloud_max,
        })
    }

    /// Render the OData `$filter` expression: date sub-filters OR-combined,
    /// then AND-combined with the spatial and attribute clauses.
    pub fn to_odata(&self) -> Result<String> {
        if self.intervals.is_empty() {
            return Err(VegsatError::Query {
                reason: "filter has no date intervals".to_string(),
            });
        }
        let date_clauses: Vec<String> = self
            .intervals
            .iter()
            .map(|interval| {
                format!(
                    "(SensingDate ge {} and SensingDate le {})",
                    interval.start, interval.end
                )
            })
            .collect();

        let mut clauses = vec![format!("({})", date_clauses.join(" or "))];
        clauses.push(format!(
            "OData.CSC.Intersects(area=geography'SRID=4326;{}')",
            self.wkt_area
        ));
        clauses.push(format!("ProductType eq '{}'", self.product_type));
        if let Some(platform) = &self.platform_name {
            clauses.push(format!("Platform eq '{platform}'"));
        }
        clauses.push(format!("CloudCover le {}", self.cloud_max));
        Ok(clauses.join(" and "))
    }
}

/// Blocking client for the imagery catalog.
///
/// Authenticates once at construction; the password never leaves
/// [`CatalogClient::connect`] and is never logged.
pub struct CatalogClient {
    client: Client,
    api_url: Url,
    token: String,
}

impl CatalogClient {
    pub fn connect(credentials: &Credentials) -> Result<Self> {
        let api_url =
            Url::parse(&credentials.api_url).map_err(|e| VegsatError::ConfigInvalid {
                key: "credentials.api_url".to_string(),
                reason: e.to_string(),
            })?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VegsatError::Query {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        tracing::info!(api_url = %api_url, "connecting to imagery catalog");

        let token_url = join_path(&api_url, "auth/token")?;
        let response = client
            .post(token_url)
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.user.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .map_err(|e| VegsatError::Query {
                reason: format!("authentication transport failure: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VegsatError::Authentication {
                api_url: credentials.api_url.clone(),
            });
        }
        if !status.is_success() {
            return Err(VegsatError::Query {
                reason: format!("token endpoint returned {status}"),
            });
        }

        let token: TokenResponse = response.json().map_err(|e| VegsatError::Query {
            reason: format!("malformed token response: {e}"),
        })?;

        Ok(CatalogClient {
            client,
            api_url,
            token: token.access_token,
        })
    }

    /// Submit one search and return the matching products in catalog
    /// response order. No client-side re-sorting, no automatic retry.
    pub fn query(&self, filter: &ProductFilter) -> Result<Vec<ProductRecord>> {
        let odata = filter.to_odata()?;
        let mut url = join_path(&self.api_url, "products")?;
        url.query_pairs_mut().append_pair("$filter", &odata);

        tracing::debug!(filter = %odata, "submitting catalog query");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| VegsatError::Query {
                reason: format!("query transport failure: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VegsatError::Authentication {
                api_url: self.api_url.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VegsatError::Query {
                reason: format!("catalog returned {status}: {body}"),
            });
        }

        let page: QueryPage = response.json().map_err(|e| VegsatError::Query {
            reason: format!("malformed catalog response: {e}"),
        })?;

        tracing::info!(count = page.value.len(), "catalog query finished");
        Ok(page.value)
    }

    /// Request the full payload for one product. Returns the open response
    /// stream; the caller owns writing it to disk.
    pub fn fetch_product(&self, id: &str) -> Result<reqwest::blocking::Response> {
        let url = join_path(&self.api_url, &format!("products({id})/$value"))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| VegsatError::Query {
                reason: format!("download transport failure: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VegsatError::Authentication {
                api_url: self.api_url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(VegsatError::Query {
                reason: format!("catalog returned {status} for product {id}"),
            });
        }
        Ok(response)
    }
}

/// Join a relative path onto the API base, tolerating a base with or without
/// a trailing slash.
fn join_path(base: &Url, path: &str) -> Result<Url> {
    let mut base_str = base.as_str().to_string();
    if !base_str.ends_with('/') {
        base_str.push('/');
    }
    Url::parse(&base_str)
        .and_then(|b| b.join(path))
        .map_err(|e| VegsatError::Query {
            reason: format!("cannot build catalog URL for '{path}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_for(years: (i32, i32), months: [u32; 2]) -> ProductFilter {
        ProductFilter {
            wkt_area: "POLYGON((0 0,1 0,1 1,0 1,0 0))".to_string(),
            product_type: "S2MSI2A".to_string(),
            platform_name: Some("Sentinel-2".to_string()),
            cloud_max: 5.0,
            intervals: month_limited_intervals(years.0, years.1, months).unwrap(),
        }
    }

    #[test]
    fn one_interval_per_year_inclusive() {
        let intervals = month_limited_intervals(2019, 2024, [5, 8]).unwrap();
        assert_eq!(intervals.len(), 6);
        for (offset, interval) in intervals.iter().enumerate() {
            let year = 2019 + offset as i32;
            assert_eq!(interval.start, NaiveDate::from_ymd_opt(year, 5, 1).unwrap());
            assert_eq!(interval.end, NaiveDate::from_ymd_opt(year, 8, 31).unwrap());
        }
    }

    #[test]
    fn may_august_2020_2021_yields_exactly_two_intervals() {
        let intervals = month_limited_intervals(2020, 2021, [5, 8]).unwrap();
        assert_eq!(
            intervals,
            vec![
                DateInterval {
                    start: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2020, 8, 31).unwrap(),
                },
                DateInterval {
                    start: NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2021, 8, 31).unwrap(),
                },
            ]
        );
    }

    #[test]
    fn month_end_arithmetic_handles_short_and_long_months() {
        let feb_leap = month_limited_intervals(2020, 2020, [2, 2]).unwrap();
        assert_eq!(feb_leap[0].end, NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());

        let feb = month_limited_intervals(2021, 2021, [1, 2]).unwrap();
        assert_eq!(feb[0].end, NaiveDate::from_ymd_opt(2021, 2, 28).unwrap());

        let december = month_limited_intervals(2021, 2021, [11, 12]).unwrap();
        assert_eq!(december[0].end, NaiveDate::from_ymd_opt(2021, 12, 31).unwrap());
    }

    #[test]
    fn intervals_never_cross_year_boundaries() {
        let intervals = month_limited_intervals(2019, 2022, [1, 12]).unwrap();
        assert_eq!(intervals.len(), 4);
        for interval in intervals {
            assert_eq!(
                interval.start.format("%Y").to_string(),
                interval.end.format("%Y").to_string()
            );
        }
    }

    #[test]
    fn inverted_years_are_rejected() {
        let err = month_limited_intervals(2024, 2019, [5, 8]).unwrap_err();
        assert!(matches!(err, VegsatError::ConfigInvalid { .. }));
    }

    #[test]
    fn odata_filter_combines_date_group_with_and_clauses() {
        let odata = filter_for((2020, 2021), [5, 8]).to_odata().unwrap();

        assert!(odata.contains(
            "(SensingDate ge 2020-05-01 and SensingDate le 2020-08-31) \
             or (SensingDate ge 2021-05-01 and SensingDate le 2021-08-31)"
        ));
        assert!(odata.contains("ProductType eq 'S2MSI2A'"));
        assert!(odata.contains("Platform eq 'Sentinel-2'"));
        assert!(odata.contains("CloudCover le 5"));
        assert!(odata.contains("SRID=4326;POLYGON((0 0,1 0,1 1,0 1,0 0))"));
        // Date alternatives are grouped before the AND chain.
        assert!(odata.starts_with("((SensingDate"));
    }

    #[test]
    fn odata_filter_omits_platform_when_unset() {
        let mut filter = filter_for((2020, 2020), [5, 8]);
        filter.platform_name = None;
        let odata = filter.to_odata().unwrap();
        assert!(!odata.contains("Platform eq"));
    }

    #[test]
    fn product_records_deserialize_from_catalog_payload() {
        let payload = r#"{
            "value": [
                {
                    "Id": "7bd8b965-1606-4724-b744-2e58c8c9f4d0",
                    "Name": "S2A_MSIL2A_20200612T103031",
                    "SensingDate": "2020-06-12T10:30:31Z",
                    "CloudCover": 3.2,
                    "ProductType": "S2MSI2A",
                    "Platform": "Sentinel-2"
                }
            ]
        }"#;
        let page: QueryPage = serde_json::from_str(payload).unwrap();
        assert_eq!(page.value.len(), 1);
        let record = &page.value[0];
        assert_eq!(record.id, "7bd8b965-1606-4724-b744-2e58c8c9f4d0");
        assert_eq!(record.cloud_cover, 3.2);
        assert_eq!(record.platform, "Sentinel-2");
    }

    #[test]
    fn join_path_tolerates_trailing_slash() {
        let with = Url::parse("https://example.org/odata/v1/").unwrap();
        let without = Url::parse("https://example.org/odata/v1").unwrap();
        assert_eq!(
            join_path(&with, "products").unwrap().as_str(),
            join_path(&without, "products").unwrap().as_str()
        );
    }
}
