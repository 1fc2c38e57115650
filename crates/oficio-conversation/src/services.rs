//! The process-wide service graph, wired once in `main` by constructor
//! injection and shared as one `Arc`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use oficio_ai::{ContentModerator, NeedExtractor, OpenAiChat, ProviderValidator};
use oficio_availability::AvailabilityCoordinator;
use oficio_core::config::OficioConfig;
use oficio_flows::{FlowStore, ProfileCache};
use oficio_kv::KvClient;
use oficio_search::SearchClient;
use oficio_sessions::SessionLog;
use oficio_store::{ConsentRepo, CustomerRepo, ServiceRelationRepo, StoreClient};

use crate::consent::ConsentService;
use crate::directory::CustomerDirectory;
use crate::outbound::WhatsAppSender;

pub struct ConversationServices {
    pub config: OficioConfig,
    pub kv: KvClient,
    pub flows: FlowStore,
    pub sessions: SessionLog,
    pub customers: CustomerDirectory,
    /// Shared profile cache; also holds the presented-provider snapshots
    /// under `prov_profile_cache:{phone}`.
    pub profiles: ProfileCache,
    pub consent: ConsentService,
    pub extractor: NeedExtractor,
    pub moderator: ContentModerator,
    pub validator: ProviderValidator,
    pub search: SearchClient,
    pub availability: Arc<AvailabilityCoordinator>,
    pub whatsapp: WhatsAppSender,
    pub relations: ServiceRelationRepo,
}

impl ConversationServices {
    /// Wire the full graph. `cancel` is the process shutdown token; it stops
    /// the availability listener/publisher and is honored by the gather loop.
    pub async fn init(config: OficioConfig, cancel: CancellationToken) -> Arc<Self> {
        let kv = KvClient::connect(config.redis.url.as_deref()).await;

        let flows = FlowStore::new(kv.clone(), Duration::from_secs(config.flow.ttl_secs));
        let sessions = SessionLog::new(kv.clone());
        let profile_cache = ProfileCache::new(
            kv.clone(),
            Duration::from_secs(config.flow.profile_cache_ttl_secs),
        );

        let store = StoreClient::new(&config.store);
        let customers =
            CustomerDirectory::new(CustomerRepo::new(store.clone()), profile_cache.clone());
        let consent = ConsentService::new(ConsentRepo::new(store.clone()));
        let relations = ServiceRelationRepo::new(store);

        let model = OpenAiChat::from_config(&config.llm);
        let chat_model = model.map(|m| m as Arc<dyn oficio_ai::ChatModel>);
        let extractor = NeedExtractor::new(chat_model.clone(), config.llm.use_ai_expansion);
        let moderator = ContentModerator::new(chat_model.clone(), kv.clone());
        let validator = ProviderValidator::new(chat_model);

        let search = SearchClient::new(config.search.url.clone());
        let availability = AvailabilityCoordinator::new(
            config.mqtt.clone(),
            config.availability.clone(),
            config.ops.log_sampling_rate,
            kv.clone(),
            cancel,
        );
        let whatsapp = WhatsAppSender::new(config.whatsapp.clientes_url.clone(), sessions.clone());

        Arc::new(Self {
            config,
            kv,
            flows,
            sessions,
            customers,
            profiles: profile_cache,
            consent,
            extractor,
            moderator,
            validator,
            search,
            availability,
            whatsapp,
            relations,
        })
    }
}
