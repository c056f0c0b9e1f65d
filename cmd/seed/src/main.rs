//! Seeds a local catalog database with the sample surplus-materials
//! inventory, for development without a hosted backend.

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use domains::{
    Category, CategoryRef, ListingSource, NewListingRecord, SellerType, UserId,
};
use storage_adapters::SqliteListingSource;

struct SeedListing {
    title: &'static str,
    description: &'static str,
    price_pence: i64,
    category: &'static str,
    image: &'static str,
    boosted: bool,
}

const CATEGORIES: &[(&str, &str)] = &[
    ("Building Materials", "Bricks, blocks, mesh, and general site surplus"),
    ("Timber", "Beams, boards, and offcuts"),
    ("Paint", "Paints, stains, and finishes"),
    ("Tools", "Hand and power tools"),
    ("Fixings", "Screws, anchors, brackets, and adhesives"),
];

const LISTINGS: &[SeedListing] = &[
    SeedListing {
        title: "Wall-tie mesh",
        description: "Wall-tie mesh for construction projects",
        price_pence: 500,
        category: "Building Materials",
        image: "/listings/page_1.png",
        boosted: true,
    },
    SeedListing {
        title: "Anchor bond",
        description: "Anchor bond adhesive for secure mounting",
        price_pence: 500,
        category: "Fixings",
        image: "/listings/page_1.png",
        boosted: false,
    },
    SeedListing {
        title: "Cleats",
        description: "Metal cleats/brackets for construction",
        price_pence: 1000,
        category: "Fixings",
        image: "/listings/page_2.png",
        boosted: false,
    },
    SeedListing {
        title: "Spray paint",
        description: "Professional spray paint - £4 each",
        price_pence: 400,
        category: "Paint",
        image: "/listings/page_2.png",
        boosted: false,
    },
    SeedListing {
        title: "Plastic floor protector",
        description: "Heavy-duty floor protection sheeting",
        price_pence: 1500,
        category: "Building Materials",
        image: "/listings/page_3.png",
        boosted: false,
    },
    SeedListing {
        title: "Oak beam",
        description: "Reclaimed oak beam, 2.4m",
        price_pence: 1500,
        category: "Timber",
        image: "/listings/page_3.png",
        boosted: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = configs::Settings::load().context("loading settings")?;
    let source = SqliteListingSource::new(&settings.remote.database_url)
        .await
        .context("opening catalog database")?;

    for (name, description) in CATEGORIES {
        source
            .put_category(&Category {
                id: Uuid::now_v7(),
                name: (*name).to_string(),
                description: Some((*description).to_string()),
            })
            .await
            .with_context(|| format!("seeding category {name}"))?;
    }
    tracing::info!(count = CATEGORIES.len(), "categories seeded");

    let seller: UserId = Uuid::now_v7();
    source.register_user(seller, false).await?;
    let admin: UserId = Uuid::now_v7();
    source.register_user(admin, true).await?;
    tracing::info!(%seller, %admin, "sample users registered");

    for seed in LISTINGS {
        let listing = source
            .insert(&NewListingRecord {
                owner: seller,
                title: seed.title.to_string(),
                description: seed.description.to_string(),
                price_pence: seed.price_pence,
                category: CategoryRef::Name(seed.category.to_string()),
                images: vec![seed.image.to_string()],
                location: Some("Edinburgh".to_string()),
                coords: None,
                contact: "roger@example.com".to_string(),
                seller_type: SellerType::Tradesman,
                boosted: seed.boosted,
            })
            .await
            .with_context(|| format!("seeding listing {}", seed.title))?;
        tracing::info!(title = seed.title, id = %listing.id, "listing seeded");
    }

    Ok(())
}
