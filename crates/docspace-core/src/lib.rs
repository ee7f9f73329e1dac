//! Core of the DocSpace edge workload: a small portable request pipeline plus the
//! site's page-support services (Companies House proxy, charge summaries, SEO head
//! rendering, sitemap, dual URL routing, director lookup and the hosted backend wrapper).

pub mod app;
pub mod backend;
pub mod body;
pub mod charges;
pub mod companies_house;
pub mod company;
pub mod config;
pub mod context;
pub mod director;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod http;
pub mod middleware;
pub mod params;
pub mod proxy;
pub mod response;
pub mod router;
pub mod routing;
pub mod seo;
pub mod sitemap;

mod templates;
