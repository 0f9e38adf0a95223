// src/aggregate/sources.rs
//! Default source registry: the eight upstream endpoints behind the gateway and the
//! fallback markers each of them uses when it runs without real API credentials.

use super::types::{Category, Sentinels, Source};

struct Known {
    id: Category,
    path: &'static str,
    sentinels: Option<(&'static str, &'static str, &'static str, &'static str)>,
}

// (error sentinel, live source label, default advisory, registration hint)
const KNOWN: [Known; 8] = [
    Known {
        id: Category::News,
        path: "/api/news/trending",
        sentinels: Some((
            "STATIC DATA - No API Key Found",
            "REAL API DATA",
            "This is mock data. Add NEWS_API_KEY to env.local for real news.",
            "https://newsapi.org/register",
        )),
    },
    Known {
        id: Category::Jobs,
        path: "/api/jobs/trending",
        sentinels: Some((
            "STATIC DATA - No LinkedIn API Key Found",
            "REAL LINKEDIN API DATA",
            "This is mock data. Add LINKEDIN_API_KEY to env.local for real jobs.",
            "https://developer.linkedin.com/",
        )),
    },
    Known {
        id: Category::Videos,
        path: "/api/videos/trending",
        sentinels: Some((
            "STATIC DATA - No YouTube API Key Found",
            "REAL YOUTUBE API DATA",
            "This is mock data. Add YOUTUBE_API_KEY to env.local for real videos.",
            "https://console.developers.google.com/",
        )),
    },
    Known {
        id: Category::Deals,
        path: "/api/deals/trending",
        sentinels: Some((
            "STATIC DATA - No Amazon API Key Found",
            "REAL AMAZON API DATA",
            "This is mock data. Add AMAZON_API_KEY to env.local for real deals.",
            "https://webservices.amazon.com/",
        )),
    },
    Known {
        id: Category::Movies,
        path: "/api/movies/trending",
        sentinels: Some((
            "STATIC DATA - No TMDB API Key Found",
            "REAL TMDB API DATA",
            "This is mock data. Add TMDB_API_KEY to env.local for real movies.",
            "https://www.themoviedb.org/settings/api",
        )),
    },
    Known {
        id: Category::Food,
        path: "/api/food/trending",
        sentinels: Some((
            "STATIC DATA - No Recipe API Key Found",
            "REAL SPOONACULAR API DATA",
            "This is mock data. Add RECIPE_API_KEY to env.local for real recipes.",
            "https://spoonacular.com/food-api",
        )),
    },
    Known {
        id: Category::Recommendations,
        path: "/api/recommendations",
        sentinels: None,
    },
    Known {
        id: Category::Nft,
        path: "/api/nft/{user_id}",
        sentinels: None,
    },
];

/// The registry used when the config file does not list `[[sources]]`.
pub fn default_sources() -> Vec<Source> {
    KNOWN
        .iter()
        .map(|k| Source {
            id: k.id,
            path: k.path.to_string(),
            list_field: None,
            sentinels: k.sentinels.map(|(error, label, message, hint)| Sentinels {
                error: error.to_string(),
                source_label: label.to_string(),
                item_flag: "is_static".to_string(),
                default_message: message.to_string(),
                registration_hint: hint.to_string(),
            }),
        })
        .collect()
}
