use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::catalog::standard_catalog;
use super::state::{Card, CardId};

/// 抽卡来源。引擎不负责牌组构建与洗牌。
pub trait CardSupplier {
    fn draw_card(&mut self) -> Card;

    /// 之后发出的 id 必须大于 `id`。状态可能来自别的引擎实例，引擎在抽卡前调用。
    fn reserve_ids_above(&mut self, id: CardId);
}

impl<S: CardSupplier + ?Sized> CardSupplier for Box<S> {
    fn draw_card(&mut self) -> Card {
        (**self).draw_card()
    }

    fn reserve_ids_above(&mut self, id: CardId) {
        (**self).reserve_ids_above(id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupplyError {
    #[error("card catalog is empty")]
    EmptyCatalog,
}

/// 从卡表中随机复制模板并分配新 id 的抽卡器，可指定种子复现结果。
#[derive(Debug, Clone)]
pub struct CatalogSupplier {
    templates: Vec<Card>,
    rng: SmallRng,
    next_id: CardId,
}

impl CatalogSupplier {
    pub fn new(templates: Vec<Card>) -> Result<Self, SupplyError> {
        Self::build(templates, SmallRng::from_entropy())
    }

    pub fn with_seed(templates: Vec<Card>, seed: u64) -> Result<Self, SupplyError> {
        Self::build(templates, SmallRng::seed_from_u64(seed))
    }

    /// 使用内置卡表。
    pub fn standard(seed: Option<u64>) -> Result<Self, SupplyError> {
        let templates = standard_catalog().to_vec();
        match seed {
            Some(seed) => Self::with_seed(templates, seed),
            None => Self::new(templates),
        }
    }

    fn build(templates: Vec<Card>, rng: SmallRng) -> Result<Self, SupplyError> {
        if templates.is_empty() {
            return Err(SupplyError::EmptyCatalog);
        }
        Ok(Self {
            templates,
            rng,
            next_id: 1,
        })
    }

    pub fn templates(&self) -> &[Card] {
        &self.templates
    }
}

impl CardSupplier for CatalogSupplier {
    fn draw_card(&mut self) -> Card {
        let index = self.rng.gen_range(0..self.templates.len());
        let card = self.templates[index].copy_with_id(self.next_id);
        self.next_id += 1;
        card
    }

    fn reserve_ids_above(&mut self, id: CardId) {
        self.next_id = self.next_id.max(id.saturating_add(1));
    }
}

/// 按固定顺序循环发牌，供测试与回放使用。
#[derive(Debug, Clone)]
pub struct SequenceSupplier {
    templates: Vec<Card>,
    cursor: usize,
    next_id: CardId,
    drawn: usize,
}

impl SequenceSupplier {
    pub fn new(templates: Vec<Card>) -> Result<Self, SupplyError> {
        if templates.is_empty() {
            return Err(SupplyError::EmptyCatalog);
        }
        Ok(Self {
            templates,
            cursor: 0,
            next_id: 1,
            drawn: 0,
        })
    }

    pub fn starting_at(mut self, id: CardId) -> Self {
        self.next_id = id;
        self
    }

    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl CardSupplier for SequenceSupplier {
    fn draw_card(&mut self) -> Card {
        let card = self.templates[self.cursor].copy_with_id(self.next_id);
        self.cursor = (self.cursor + 1) % self.templates.len();
        self.next_id += 1;
        self.drawn += 1;
        card
    }

    fn reserve_ids_above(&mut self, id: CardId) {
        self.next_id = self.next_id.max(id.saturating_add(1));
    }
}
