// Everything a handler may reach, bundled once in the composition root.

use crate::core::actions::RegistryHandle;
use crate::core::anti_spam::AntiSpamService;
use crate::core::config_store::{ConfigStore, GuildConfig};
use crate::core::flows::FollowUps;
use crate::core::media::{ImageRenderer, OcrService};
use crate::core::platform::PlatformClient;
use crate::core::settings::BotSettings;
use crate::core::tag_sweep::TagSweeper;
use std::sync::Arc;

pub struct Services {
    pub settings: Arc<BotSettings>,
    pub platform: Arc<dyn PlatformClient>,
    pub config: Arc<GuildConfig>,
    pub images: Arc<dyn ImageRenderer>,
    pub ocr: Arc<dyn OcrService>,
    pub registry: Arc<RegistryHandle>,
    pub follow_ups: FollowUps,
    pub anti_spam: AntiSpamService,
    pub tag_sweep: TagSweeper,
}

impl Services {
    pub fn new(
        settings: BotSettings,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn ConfigStore>,
        images: Arc<dyn ImageRenderer>,
        ocr: Arc<dyn OcrService>,
        registry: Arc<RegistryHandle>,
    ) -> Self {
        let config = Arc::new(GuildConfig::new(store));
        Self {
            follow_ups: FollowUps::new(settings.prompt_timeout),
            anti_spam: AntiSpamService::new(Arc::clone(&config)),
            tag_sweep: TagSweeper::new(settings.tag_sweep.clone()),
            settings: Arc::new(settings),
            platform,
            config,
            images,
            ocr,
            registry,
        }
    }
}
