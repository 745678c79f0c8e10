use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Kind of region a score set belongs to.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionType {
    Province,
    Island,
}

impl RegionType {
    /**
     * Value stored in the `region_type` column.
     */
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::Province => "province",
            RegionType::Island => "island",
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RegionType {
    type Err = ApplicationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "province" => Ok(RegionType::Province),
            "island" => Ok(RegionType::Island),
            _ => Err(ApplicationError::new(ErrorType::Validation, format!("Unknown region type {value}"))),
        }
    }
}

/**
 * A province or island the map artwork knows about.
 */
#[derive(Debug, Clone, Copy)]
pub struct KnownRegion {
    pub name: &'static str,
    pub slug: &'static str,
    pub population: i64,
    pub is_capital: bool,
    pub region_type: RegionType,
}

const fn province(name: &'static str, slug: &'static str, population: i64) -> KnownRegion {
    KnownRegion { name, slug, population, is_capital: false, region_type: RegionType::Province }
}

const fn island(name: &'static str, slug: &'static str, population: i64) -> KnownRegion {
    KnownRegion { name, slug, population, is_capital: false, region_type: RegionType::Island }
}

/**
 * Every region drawn on the map, with the population used when seeding.
 */
pub const KNOWN_REGIONS: [KnownRegion; 45] = [
    province("آذربایجان شرقی", "azerbaijan-east", 4_000_000),
    province("آذربایجان غربی", "azerbaijan-west", 3_000_000),
    province("اردبیل", "ardabil", 1_500_000),
    province("اصفهان", "isfahan", 5_000_000),
    province("البرز", "alborz", 2_700_000),
    province("ایلام", "ilam", 600_000),
    province("بوشهر", "bushehr", 1_200_000),
    KnownRegion { name: "تهران", slug: "tehran", population: 14_000_000, is_capital: true, region_type: RegionType::Province },
    province("چهارمحال بختیاری", "chahar-mahaal-bakhtiari", 1_000_000),
    province("خراسان جنوبی", "khorasan-south", 800_000),
    province("خراسان رضوی", "khorasan-razavi", 6_000_000),
    province("خراسان شمالی", "khorasan-north", 1_000_000),
    province("خوزستان", "khuzestan", 4_700_000),
    province("زنجان", "zanjan", 1_000_000),
    province("سمنان", "semnan", 700_000),
    province("سیستان و بلوچستان", "sistan-baluchestan", 2_700_000),
    province("فارس", "fars", 4_900_000),
    province("قزوین", "qazvin", 1_100_000),
    province("قم", "qom", 1_200_000),
    province("کردستان", "kurdistan", 1_400_000),
    province("کرمان", "kerman", 3_200_000),
    province("کرمانشاه", "kermanshah", 2_000_000),
    province("کهگیلویه و بویر احمد", "kohgiluyeh-boyer-ahmad", 700_000),
    province("گلستان", "golestan", 1_900_000),
    province("گیلان", "gilan", 2_500_000),
    province("لرستان", "lorestan", 1_700_000),
    province("مازندران", "mazandaran", 3_300_000),
    province("مرکزی", "markazi", 1_300_000),
    province("هرمزگان", "hormozgan", 1_600_000),
    province("همدان", "hamadan", 1_700_000),
    province("یزد", "yazd", 1_100_000),
    island("ابو موسی", "abu-musa", 20_000),
    island("قشم", "qeshm", 130_000),
    island("فرور بزرگ", "faror-big", 1_000),
    island("فرور کوچک", "faror-small", 800),
    island("هندروابی", "hendorabi", 500),
    island("هنگام", "hengam", 1_500),
    island("هرمز", "hormoz", 1_000),
    island("خارک", "khark", 10_000),
    island("کیش", "kish", 50_000),
    island("لارک", "lark", 3_000),
    island("لاوان", "lavan", 2_000),
    island("سیری", "siri", 1_500),
    island("تنب بزرگ", "tunb-big", 1_000),
    island("تنب کوچک", "tunb-small", 800),
];

/**
 * Bidirectional lookup between region display names and map slugs.
 *
 * Built once at startup and shared read-only between workers.
 */
#[derive(Debug, Clone)]
pub struct RegionResolver {
    slug_by_name: HashMap<&'static str, &'static str>,
    name_by_slug: HashMap<&'static str, &'static str>,
}

impl RegionResolver {
    /**
     * Creates a resolver over the given regions.
     *
     * # Arguments
     * `regions`: Regions with unique names and unique slugs.
     *
     * # Returns
     * The resolver, or a `Initialization` error if a name or slug is repeated.
     */
    pub fn new(regions: &[KnownRegion]) -> Result<Self, ApplicationError> {
        let mut slug_by_name = HashMap::with_capacity(regions.len());
        let mut name_by_slug = HashMap::with_capacity(regions.len());
        for region in regions {
            if slug_by_name.insert(region.name, region.slug).is_some() {
                return Err(ApplicationError::new(ErrorType::Initialization, format!("Region name {} mapped twice", region.name)));
            }
            if name_by_slug.insert(region.slug, region.name).is_some() {
                return Err(ApplicationError::new(ErrorType::Initialization, format!("Region slug {} mapped twice", region.slug)));
            }
        }
        Ok(RegionResolver { slug_by_name, name_by_slug })
    }

    /**
     * Creates a resolver over `KNOWN_REGIONS`.
     */
    pub fn with_known_regions() -> Result<Self, ApplicationError> {
        Self::new(&KNOWN_REGIONS)
    }

    pub fn slug_for(&self, name: &str) -> Option<&'static str> {
        self.slug_by_name.get(name).copied()
    }

    pub fn name_for(&self, slug: &str) -> Option<&'static str> {
        self.name_by_slug.get(slug).copied()
    }
}

/**
 * Key used for a slug in the map payload; the map script addresses regions with underscores.
 */
pub fn map_key(slug: &str) -> String {
    slug.replace('-', "_")
}
