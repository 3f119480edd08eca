use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

// ─── Constants ───────────────────────────────────────────────────

const NUM_PRODUCTS: usize = 100;
/// Fixed seed so every process serves the same catalog.
const SEED: u64 = 42;

// ─── Name pools ──────────────────────────────────────────────────

static ADJ: &[&str] = &[
    "Premium",
    "Ultra",
    "Wireless",
    "Smart",
    "Compact",
    "Professional",
    "Ergonomic",
    "Portable",
    "Advanced",
    "Digital",
    "Classic",
    "Modern",
];

static NOUN: &[&str] = &[
    "Keyboard",
    "Mouse",
    "Monitor",
    "Headphones",
    "Speaker",
    "Camera",
    "Microphone",
    "Tablet",
    "Charger",
    "Router",
    "Dock",
    "Controller",
];

static CAT: &[&str] = &[
    "electronics",
    "accessories",
    "audio",
    "computing",
    "networking",
    "gaming",
];

// ─── Domain type ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    /// Price in cents (e.g. 12999 = $129.99)
    pub price_cents: u64,
    pub stock: u32,
    pub category: String,
    pub description: String,
}

/// Filter accepted by the list and search endpoints. Empty fields match
/// everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub max_price_cents: Option<u64>,
    pub limit: Option<usize>,
}

impl ProductQuery {
    fn matches(&self, product: &Product) -> bool {
        let text_ok = self.query.as_deref().map_or(true, |q| {
            let q = q.to_lowercase();
            product.name.to_lowercase().contains(&q) || product.description.to_lowercase().contains(&q)
        });
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| product.category.eq_ignore_ascii_case(c));
        let price_ok = self.max_price_cents.map_or(true, |max| product.price_cents <= max);
        text_ok && category_ok && price_ok
    }
}

// ─── Catalog ─────────────────────────────────────────────────────

/// Read-only in-memory product list.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Generate the fixed catalog. Same seed, same products.
    pub fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(SEED);
        let products = (0..NUM_PRODUCTS)
            .map(|i| {
                let adj = ADJ[rng.gen_range(0..ADJ.len())];
                let noun = NOUN[rng.gen_range(0..NOUN.len())];
                let category = CAT[rng.gen_range(0..CAT.len())];
                Product {
                    id: i as u32 + 1,
                    name: format!("{adj} {noun}"),
                    price_cents: rng.gen_range(999..=99_999u64),
                    stock: rng.gen_range(0..=1000u32),
                    category: category.to_string(),
                    description: format!(
                        "High-quality {} {} for {} use.",
                        adj.to_lowercase(),
                        noun.to_lowercase(),
                        category,
                    ),
                }
            })
            .collect();
        Self { products }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn get(&self, id: u32) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn search(&self, query: &ProductQuery) -> Vec<Product> {
        let limit = query.limit.unwrap_or(usize::MAX);
        self.products
            .iter()
            .filter(|p| query.matches(p))
            .take(limit)
            .cloned()
            .collect()
    }
}
